//! # Format Conversion
//!
//! Converts arbitrary audio files into the sampler's playback format.
//!
//! The pipeline is symphonia (decode to planar f32) → channel remix →
//! rubato (sinc resample to 44.1 kHz) → hound (16-bit PCM WAV). The output
//! is written to `<destination>.part` and renamed into place, so a failed
//! conversion never leaves a destination file behind.

use crate::error::{AudioError, Result};
use crate::format::{RAMPLE_BIT_DEPTH, RAMPLE_SAMPLE_RATE};
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::ffi::OsString;
use std::fmt::Display;
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, instrument, warn};

/// Frames fed to the resampler per call.
const RESAMPLE_CHUNK_FRAMES: usize = 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Mix every channel down to one.
    pub force_mono: bool,
}

impl ConversionOptions {
    pub fn mono() -> Self {
        Self { force_mono: true }
    }
}

/// Converts a source file into a sampler-compatible WAV at `destination`.
///
/// Implementations must only create `destination` when they succeed.
#[async_trait]
pub trait FormatConverter: Send + Sync {
    async fn convert(
        &self,
        source: &Path,
        destination: &Path,
        options: ConversionOptions,
    ) -> Result<()>;
}

/// Default converter backed by symphonia, rubato and hound.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavConverter;

impl WavConverter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FormatConverter for WavConverter {
    #[instrument(skip_all, fields(file = %crate::file_label(source), force_mono = options.force_mono))]
    async fn convert(
        &self,
        source: &Path,
        destination: &Path,
        options: ConversionOptions,
    ) -> Result<()> {
        let source = source.to_path_buf();
        let destination = destination.to_path_buf();
        tokio::task::spawn_blocking(move || convert_blocking(&source, &destination, options))
            .await
            .map_err(|e| AudioError::TaskFailed(e.to_string()))?
    }
}

/// Synchronous conversion; call from a blocking context.
pub fn convert_blocking(
    source: &Path,
    destination: &Path,
    options: ConversionOptions,
) -> Result<()> {
    let decoded = decode(source)?;
    let source_rate = decoded.sample_rate;
    let source_channels = decoded.channels.len();

    let mixed = remix(decoded.channels, options.force_mono);
    let resampled = if source_rate == RAMPLE_SAMPLE_RATE {
        mixed
    } else {
        resample(mixed, source_rate, RAMPLE_SAMPLE_RATE)?
    };

    let part = part_path(destination);
    let written = write_wav(&part, &resampled).and_then(|()| {
        std::fs::rename(&part, destination)?;
        Ok(())
    });
    if let Err(err) = written {
        let _ = std::fs::remove_file(&part);
        return Err(err);
    }

    info!(
        source_rate,
        source_channels,
        output_channels = resampled.len(),
        "Converted sample"
    );
    Ok(())
}

struct DecodedAudio {
    sample_rate: u32,
    /// Planar samples, one vector per channel.
    channels: Vec<Vec<f32>>,
}

fn decode(path: &Path) -> Result<DecodedAudio> {
    let file = File::open(path)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut reader = probed.format;

    let (track_id, codec_params) = {
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::UnsupportedFormat("no audio track".to_string()))?;
        (track.id, track.codec_params.clone())
    };
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| AudioError::DecodeFailed("unknown sample rate".to_string()))?;

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let buffer = match decoder.decode(&packet) {
            Ok(buffer) => buffer,
            Err(SymphoniaError::DecodeError(msg)) => {
                warn!(reason = msg, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *buffer.spec();
        let count = spec.channels.count();
        if channels.is_empty() {
            channels = vec![Vec::new(); count];
        } else if channels.len() != count {
            return Err(AudioError::DecodeFailed(format!(
                "channel count changed from {} to {}",
                channels.len(),
                count
            )));
        }

        let mut samples = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
        samples.copy_interleaved_ref(buffer);
        for frame in samples.samples().chunks(count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
    }

    if channels.first().map_or(true, Vec::is_empty) {
        return Err(AudioError::DecodeFailed("no audio frames".to_string()));
    }

    debug!(sample_rate, channels = channels.len(), frames = channels[0].len(), "Decoded source");
    Ok(DecodedAudio {
        sample_rate,
        channels,
    })
}

/// Mix to mono when forced, fold more than two channels down to stereo.
fn remix(channels: Vec<Vec<f32>>, force_mono: bool) -> Vec<Vec<f32>> {
    match channels.len() {
        0 | 1 => channels,
        2 if !force_mono => channels,
        _ if force_mono => vec![average(channels.iter())],
        _ => {
            let left = average(channels.iter().step_by(2));
            let right = average(channels.iter().skip(1).step_by(2));
            vec![left, right]
        }
    }
}

fn average<'a>(channels: impl Iterator<Item = &'a Vec<f32>> + Clone) -> Vec<f32> {
    let count = channels.clone().count();
    let frames = channels.clone().map(Vec::len).min().unwrap_or(0);
    if count == 0 {
        return Vec::new();
    }
    (0..frames)
        .map(|i| channels.clone().map(|c| c[i]).sum::<f32>() / count as f32)
        .collect()
}

fn resample_error(from: u32, to: u32, err: impl Display) -> AudioError {
    AudioError::ResampleFailed {
        from,
        to,
        message: err.to_string(),
    }
}

fn resample(channels: Vec<Vec<f32>>, from: u32, to: u32) -> Result<Vec<Vec<f32>>> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = f64::from(to) / f64::from(from);
    let channel_count = channels.len();
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK_FRAMES, channel_count)
            .map_err(|e| resample_error(from, to, e))?;

    let total_in = channels.iter().map(Vec::len).min().unwrap_or(0);
    let expected = (total_in as f64 * ratio).ceil() as usize;
    let delay = resampler.output_delay();
    let mut output = vec![Vec::with_capacity(expected + delay); channel_count];

    let mut position = 0;
    while total_in - position >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let chunk: Vec<&[f32]> = channels
            .iter()
            .map(|c| &c[position..position + needed])
            .collect();
        let processed = resampler
            .process(&chunk, None)
            .map_err(|e| resample_error(from, to, e))?;
        append_planar(&mut output, processed);
        position += needed;
    }

    if position < total_in {
        let rest: Vec<&[f32]> = channels.iter().map(|c| &c[position..total_in]).collect();
        let processed = resampler
            .process_partial(Some(&rest), None)
            .map_err(|e| resample_error(from, to, e))?;
        append_planar(&mut output, processed);
    }

    // Flush the filter tail until the delayed output is covered.
    while output.first().map_or(0, Vec::len) < expected + delay {
        let processed = resampler
            .process_partial::<Vec<f32>>(None, None)
            .map_err(|e| resample_error(from, to, e))?;
        if processed.first().map_or(true, Vec::is_empty) {
            break;
        }
        append_planar(&mut output, processed);
    }

    for channel in output.iter_mut() {
        let skip = delay.min(channel.len());
        channel.drain(..skip);
        channel.truncate(expected);
    }
    Ok(output)
}

fn append_planar(output: &mut [Vec<f32>], processed: Vec<Vec<f32>>) {
    for (channel, samples) in output.iter_mut().zip(processed) {
        channel.extend(samples);
    }
}

fn write_wav(path: &Path, channels: &[Vec<f32>]) -> Result<()> {
    let channel_count = u16::try_from(channels.len())
        .map_err(|_| AudioError::EncodeFailed(format!("{} channels", channels.len())))?;
    let spec = WavSpec {
        channels: channel_count,
        sample_rate: RAMPLE_SAMPLE_RATE,
        bits_per_sample: RAMPLE_BIT_DEPTH,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    for i in 0..frames {
        for channel in channels {
            writer.write_sample(to_pcm16(channel[i]))?;
        }
    }
    writer.finalize()?;
    Ok(())
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_sine_wav;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_converts_to_rample_format() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("pad.wav");
        let dest = dir.path().join("out.wav");
        write_sine_wav(&source, 48_000, 24, 2, 9_600);

        WavConverter::new()
            .convert(&source, &dest, ConversionOptions::default())
            .await
            .unwrap();

        let reader = hound::WavReader::open(&dest).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.channels, 2);
        assert_eq!(reader.duration(), 8_820);
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_force_mono_downmixes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("stereo.wav");
        let dest = dir.path().join("mono.wav");
        write_sine_wav(&source, 44_100, 16, 2, 4_410);

        WavConverter::new()
            .convert(&source, &dest, ConversionOptions::mono())
            .await
            .unwrap();

        let reader = hound::WavReader::open(&dest).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.duration(), 4_410);
    }

    #[tokio::test]
    async fn test_failed_conversion_leaves_no_destination() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("broken.wav");
        let dest = dir.path().join("out.wav");
        std::fs::write(&source, b"RIFF but not really").unwrap();

        let result = WavConverter::new()
            .convert(&source, &dest, ConversionOptions::default())
            .await;

        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_missing_source_is_not_found() {
        let dir = tempdir().unwrap();
        let err = WavConverter::new()
            .convert(
                &dir.path().join("missing.wav"),
                &dir.path().join("out.wav"),
                ConversionOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.io_error().map(|e| e.kind()),
            Some(std::io::ErrorKind::NotFound)
        );
    }

    #[test]
    fn test_remix_folds_surround_to_stereo() {
        let channels = vec![vec![1.0; 4], vec![0.0; 4], vec![0.0; 4], vec![1.0; 4]];
        let stereo = remix(channels, false);
        assert_eq!(stereo.len(), 2);
        assert_eq!(stereo[0], vec![0.5; 4]);
        assert_eq!(stereo[1], vec![0.5; 4]);
    }

    #[test]
    fn test_pcm16_clamps() {
        assert_eq!(to_pcm16(2.0), i16::MAX);
        assert_eq!(to_pcm16(-2.0), -i16::MAX);
        assert_eq!(to_pcm16(0.0), 0);
    }
}
