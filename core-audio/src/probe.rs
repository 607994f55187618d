//! Audio header probing with lofty
//!
//! Only headers are parsed; sample data is never read.

use crate::error::{AudioError, Result};
use crate::format::{AudioProperties, Container};
use lofty::config::ParseOptions;
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::probe::Probe;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Read the audio properties of `path` on a blocking thread.
#[instrument(skip_all, fields(file = %crate::file_label(path)))]
pub async fn probe_file(path: &Path) -> Result<AudioProperties> {
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || probe_file_blocking(&owned))
        .await
        .map_err(|e| AudioError::TaskFailed(e.to_string()))?
}

pub fn probe_file_blocking(path: &Path) -> Result<AudioProperties> {
    let probe_error = |message: String| AudioError::ProbeFailed {
        path: path.to_path_buf(),
        message,
    };

    let reader = BufReader::new(File::open(path)?);
    let tagged_file = Probe::new(reader)
        .options(ParseOptions::new().read_properties(true))
        .guess_file_type()?
        .read()
        .map_err(|e| probe_error(e.to_string()))?;

    let properties = tagged_file.properties();
    let sample_rate = properties
        .sample_rate()
        .ok_or_else(|| probe_error("missing sample rate".to_string()))?;
    let channels = properties
        .channels()
        .ok_or_else(|| probe_error("missing channel count".to_string()))?;

    let props = AudioProperties {
        container: container_of(tagged_file.file_type()),
        sample_rate,
        channels: u16::from(channels),
        bit_depth: properties.bit_depth().map(u16::from),
    };
    debug!(format = %props, "Probed audio file");
    Ok(props)
}

fn container_of(file_type: FileType) -> Container {
    match file_type {
        FileType::Wav => Container::Wav,
        FileType::Aiff => Container::Aiff,
        FileType::Flac => Container::Flac,
        FileType::Mpeg => Container::Mp3,
        FileType::Vorbis | FileType::Opus => Container::Ogg,
        other => Container::Other(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_sine_wav;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_probe_wav_properties() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 48_000, 24, 2, 4_800);

        let props = probe_file(&path).await.unwrap();
        assert_eq!(props.container, Container::Wav);
        assert_eq!(props.sample_rate, 48_000);
        assert_eq!(props.channels, 2);
        assert_eq!(props.bit_depth, Some(24));
    }

    #[tokio::test]
    async fn test_probe_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = probe_file(&dir.path().join("nope.wav")).await.unwrap_err();
        let io = err.io_error().expect("io error");
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_probe_garbage_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(probe_file(&path).await.is_err());
    }
}
