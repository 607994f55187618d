//! # Core Audio
//!
//! Sample format handling for the sync engine:
//!
//! - [`format`]: the Rample playback format and compatibility checks
//! - [`probe`]: header probing with lofty
//! - [`convert`]: the [`FormatConverter`] contract and the default
//!   [`WavConverter`]

pub mod convert;
pub mod error;
pub mod format;
pub mod probe;

pub use convert::{ConversionOptions, FormatConverter, WavConverter};
pub use error::{AudioError, Result};
pub use format::{check_format, target_description, AudioProperties, Container, FormatCheck};
pub use probe::probe_file;

use std::path::Path;

/// File name of `path` for log fields.
pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
