//! Rample playback format rules
//!
//! The sampler only plays 44.1 kHz, 16-bit PCM WAV files with one or two
//! channels. Anything else must be converted before it lands on the card.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Required sample rate.
pub const RAMPLE_SAMPLE_RATE: u32 = 44_100;

/// Required PCM bit depth.
pub const RAMPLE_BIT_DEPTH: u16 = 16;

/// Maximum channel count the sampler accepts.
pub const RAMPLE_MAX_CHANNELS: u16 = 2;

/// Container of a probed audio file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Wav,
    Aiff,
    Flac,
    Mp3,
    Ogg,
    Other(String),
}

impl Container {
    pub fn label(&self) -> &str {
        match self {
            Container::Wav => "WAV",
            Container::Aiff => "AIFF",
            Container::Flac => "FLAC",
            Container::Mp3 => "MP3",
            Container::Ogg => "OGG",
            Container::Other(name) => name,
        }
    }
}

/// Header-level properties of an audio file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioProperties {
    pub container: Container,
    pub sample_rate: u32,
    pub channels: u16,
    /// `None` for lossy formats that carry no PCM bit depth.
    pub bit_depth: Option<u16>,
}

impl AudioProperties {
    pub fn is_stereo(&self) -> bool {
        self.channels > 1
    }

    /// Human readable description, e.g. `48000Hz/24bit/stereo WAV`.
    pub fn describe(&self) -> String {
        let depth = match self.bit_depth {
            Some(bits) => format!("{bits}bit"),
            None => "compressed".to_string(),
        };
        format!(
            "{}Hz/{}/{} {}",
            self.sample_rate,
            depth,
            channel_label(self.channels),
            self.container.label()
        )
    }
}

impl fmt::Display for AudioProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn channel_label(channels: u16) -> String {
    match channels {
        1 => "mono".to_string(),
        2 => "stereo".to_string(),
        n => format!("{n}ch"),
    }
}

/// Result of checking a file against the sampler's playback format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatCheck {
    /// Can be copied byte for byte.
    Compatible,
    /// Must be converted; lists every mismatch found.
    NeedsConversion { reasons: Vec<String> },
}

impl FormatCheck {
    pub fn needs_conversion(&self) -> bool {
        matches!(self, FormatCheck::NeedsConversion { .. })
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            FormatCheck::Compatible => None,
            FormatCheck::NeedsConversion { reasons } => Some(reasons.join(", ")),
        }
    }
}

/// Compare `props` with the sampler's format.
///
/// `force_mono` turns stereo files into conversion candidates.
pub fn check_format(props: &AudioProperties, force_mono: bool) -> FormatCheck {
    let mut reasons = Vec::new();

    if props.container != Container::Wav {
        reasons.push(format!("{} is not WAV", props.container.label()));
    }
    if props.sample_rate != RAMPLE_SAMPLE_RATE {
        reasons.push(format!(
            "sample rate {} Hz is not {} Hz",
            props.sample_rate, RAMPLE_SAMPLE_RATE
        ));
    }
    match props.bit_depth {
        Some(RAMPLE_BIT_DEPTH) => {}
        Some(bits) => reasons.push(format!("bit depth {bits} is not {RAMPLE_BIT_DEPTH}")),
        None => reasons.push("compressed audio".to_string()),
    }
    if props.channels > RAMPLE_MAX_CHANNELS {
        reasons.push(format!("{} channels exceed stereo", props.channels));
    } else if force_mono && props.is_stereo() {
        reasons.push("stereo file with mono conversion enabled".to_string());
    }

    if reasons.is_empty() {
        FormatCheck::Compatible
    } else {
        FormatCheck::NeedsConversion { reasons }
    }
}

/// Description of the file a conversion will produce.
pub fn target_description(props: Option<&AudioProperties>, force_mono: bool) -> String {
    let channels = match props {
        Some(p) if !force_mono && p.channels == 2 => 2,
        Some(p) if !force_mono && p.channels > 2 => 2,
        _ => 1,
    };
    AudioProperties {
        container: Container::Wav,
        sample_rate: RAMPLE_SAMPLE_RATE,
        channels,
        bit_depth: Some(RAMPLE_BIT_DEPTH),
    }
    .describe()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav(sample_rate: u32, bits: u16, channels: u16) -> AudioProperties {
        AudioProperties {
            container: Container::Wav,
            sample_rate,
            channels,
            bit_depth: Some(bits),
        }
    }

    #[test]
    fn test_native_format_is_compatible() {
        assert_eq!(check_format(&wav(44_100, 16, 1), false), FormatCheck::Compatible);
        assert_eq!(check_format(&wav(44_100, 16, 2), false), FormatCheck::Compatible);
    }

    #[test]
    fn test_mismatches_are_listed() {
        let check = check_format(&wav(48_000, 24, 2), false);
        assert!(check.needs_conversion());
        let reason = check.reason().unwrap();
        assert!(reason.contains("48000"));
        assert!(reason.contains("bit depth 24"));
    }

    #[test]
    fn test_force_mono_converts_stereo_only() {
        assert!(check_format(&wav(44_100, 16, 2), true).needs_conversion());
        assert!(!check_format(&wav(44_100, 16, 1), true).needs_conversion());
    }

    #[test]
    fn test_non_wav_needs_conversion() {
        let props = AudioProperties {
            container: Container::Flac,
            sample_rate: 44_100,
            channels: 2,
            bit_depth: Some(16),
        };
        assert!(check_format(&props, false).needs_conversion());
    }

    #[test]
    fn test_describe() {
        assert_eq!(wav(48_000, 24, 2).describe(), "48000Hz/24bit/stereo WAV");
        assert_eq!(
            target_description(Some(&wav(48_000, 24, 2)), false),
            "44100Hz/16bit/stereo WAV"
        );
        assert_eq!(
            target_description(Some(&wav(48_000, 24, 2)), true),
            "44100Hz/16bit/mono WAV"
        );
        assert_eq!(target_description(None, false), "44100Hz/16bit/mono WAV");
    }
}
