//! Error categorization
//!
//! Turns raw failures into the small taxonomy shown to users. Typed
//! `std::io::Error`s anywhere in the source chain win; otherwise the error
//! text is matched against known patterns. No I/O happens here.

use crate::operation::SyncErrorInfo;
use core_runtime::events::ErrorCategory;
use std::error::Error as StdError;
use std::io;
use std::path::Path;

const ACCESS_DENIED_PATTERNS: &[&str] = &[
    "permission denied",
    "access is denied",
    "access denied",
    "eacces",
    "eperm",
    "operation not permitted",
    "read-only",
];
const MISSING_FILE_PATTERNS: &[&str] = &["no such file", "enoent", "not found", "cannot find"];
const DISK_FULL_PATTERNS: &[&str] = &["no space", "enospc", "disk full", "disk is full"];
const INVALID_FORMAT_PATTERNS: &[&str] = &[
    "unsupported",
    "invalid format",
    "decode",
    "probe",
    "malformed",
];

#[cfg(unix)]
mod os_codes {
    pub const EPERM: i32 = 1;
    pub const ENOENT: i32 = 2;
    pub const EACCES: i32 = 13;
    pub const ENOSPC: i32 = 28;
    pub const EROFS: i32 = 30;
}

#[cfg(windows)]
mod os_codes {
    pub const ERROR_FILE_NOT_FOUND: i32 = 2;
    pub const ERROR_PATH_NOT_FOUND: i32 = 3;
    pub const ERROR_ACCESS_DENIED: i32 = 5;
    pub const ERROR_WRITE_PROTECT: i32 = 19;
    pub const ERROR_HANDLE_DISK_FULL: i32 = 39;
    pub const ERROR_DISK_FULL: i32 = 112;
}

/// Categorize an error, looking through its source chain.
pub fn categorize_error(
    error: &(dyn StdError + 'static),
    file_path: Option<&Path>,
) -> SyncErrorInfo {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if let Some(category) = category_of_io(io_err) {
                return info_for(category, file_path, &error.to_string());
            }
        }
        current = err.source();
    }
    let category = category_of_message(&chain_text(error));
    info_for(category, file_path, &error.to_string())
}

/// Every message in the source chain, outermost first.
fn chain_text(error: &(dyn StdError + 'static)) -> String {
    let mut text = error.to_string();
    let mut current = error.source();
    while let Some(err) = current {
        text.push_str(": ");
        text.push_str(&err.to_string());
        current = err.source();
    }
    text
}

/// Categorize from error text alone.
pub fn categorize_message(message: &str, file_path: Option<&Path>) -> SyncErrorInfo {
    info_for(category_of_message(message), file_path, message)
}

fn category_of_io(err: &io::Error) -> Option<ErrorCategory> {
    if let Some(code) = err.raw_os_error() {
        if let Some(category) = category_of_os_code(code) {
            return Some(category);
        }
    }
    match err.kind() {
        io::ErrorKind::PermissionDenied => Some(ErrorCategory::AccessDenied),
        io::ErrorKind::NotFound => Some(ErrorCategory::MissingFile),
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            Some(ErrorCategory::InvalidFormat)
        }
        _ => None,
    }
}

#[cfg(unix)]
fn category_of_os_code(code: i32) -> Option<ErrorCategory> {
    use os_codes::*;
    match code {
        EACCES | EPERM | EROFS => Some(ErrorCategory::AccessDenied),
        ENOENT => Some(ErrorCategory::MissingFile),
        ENOSPC => Some(ErrorCategory::DiskFull),
        _ => None,
    }
}

#[cfg(windows)]
fn category_of_os_code(code: i32) -> Option<ErrorCategory> {
    use os_codes::*;
    match code {
        ERROR_ACCESS_DENIED | ERROR_WRITE_PROTECT => Some(ErrorCategory::AccessDenied),
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND => Some(ErrorCategory::MissingFile),
        ERROR_DISK_FULL | ERROR_HANDLE_DISK_FULL => Some(ErrorCategory::DiskFull),
        _ => None,
    }
}

#[cfg(not(any(unix, windows)))]
fn category_of_os_code(_code: i32) -> Option<ErrorCategory> {
    None
}

fn category_of_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if matches(DISK_FULL_PATTERNS) {
        ErrorCategory::DiskFull
    } else if matches(ACCESS_DENIED_PATTERNS) {
        ErrorCategory::AccessDenied
    } else if matches(MISSING_FILE_PATTERNS) {
        ErrorCategory::MissingFile
    } else if matches(INVALID_FORMAT_PATTERNS) {
        ErrorCategory::InvalidFormat
    } else {
        ErrorCategory::Other
    }
}

fn info_for(category: ErrorCategory, file_path: Option<&Path>, raw: &str) -> SyncErrorInfo {
    let (user_message, can_retry) = match category {
        ErrorCategory::AccessDenied => (
            "Permission denied. Check that the SD card is not write-protected, then retry"
                .to_string(),
            true,
        ),
        ErrorCategory::MissingFile => (
            match file_path {
                Some(path) => format!("File not found: {}", path.display()),
                None => "File not found".to_string(),
            },
            false,
        ),
        ErrorCategory::InvalidFormat => (
            format!("Audio format could not be read ({raw})"),
            false,
        ),
        ErrorCategory::DiskFull => (
            "SD card is full. Free up space, then retry".to_string(),
            true,
        ),
        ErrorCategory::Other => (format!("Unexpected error: {raw}"), true),
    };
    SyncErrorInfo {
        user_message,
        can_retry,
        category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::BridgeError;
    use core_audio::AudioError;
    use std::path::PathBuf;

    #[test]
    fn test_permission_denied_kind() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let info = categorize_error(&err, None);
        assert_eq!(info.category, ErrorCategory::AccessDenied);
        assert!(info.can_retry);
    }

    #[test]
    fn test_missing_file_through_source_chain() {
        let err = BridgeError::PathNotAccessible {
            path: PathBuf::from("/store/kick.wav"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        let info = categorize_error(&err, Some(Path::new("/store/kick.wav")));
        assert_eq!(info.category, ErrorCategory::MissingFile);
        assert!(!info.can_retry);
        assert!(info.user_message.contains("/store/kick.wav"));
    }

    #[cfg(unix)]
    #[test]
    fn test_disk_full_os_code() {
        let err = io::Error::from_raw_os_error(28);
        let info = categorize_error(&err, None);
        assert_eq!(info.category, ErrorCategory::DiskFull);
        assert!(info.can_retry);
    }

    #[test]
    fn test_wrapped_message_is_matched() {
        let err = BridgeError::PathNotAccessible {
            path: PathBuf::from("/sd/A0/1kick.wav"),
            source: io::Error::new(io::ErrorKind::Other, "No space left on device"),
        };
        let info = categorize_error(&err, None);
        assert_eq!(info.category, ErrorCategory::DiskFull);
    }

    #[test]
    fn test_audio_errors_are_invalid_format() {
        let err = AudioError::UnsupportedFormat("core (codec):unsupported codec".to_string());
        let info = categorize_error(&err, None);
        assert_eq!(info.category, ErrorCategory::InvalidFormat);
        assert!(!info.can_retry);
    }

    #[test]
    fn test_message_patterns() {
        let cases = [
            ("EACCES: permission denied, open '/sd/A0/1.wav'", ErrorCategory::AccessDenied),
            ("ENOENT: no such file or directory", ErrorCategory::MissingFile),
            ("ENOSPC: no space left on device", ErrorCategory::DiskFull),
            ("Access is denied. (os error 5)", ErrorCategory::AccessDenied),
            ("invalid format: not a RIFF file", ErrorCategory::InvalidFormat),
            ("the flux capacitor broke", ErrorCategory::Other),
        ];
        for (message, expected) in cases {
            assert_eq!(categorize_message(message, None).category, expected, "{message}");
        }
    }

    #[test]
    fn test_unmatched_defaults_to_retryable_other() {
        let info = categorize_message("weird", None);
        assert_eq!(info.category, ErrorCategory::Other);
        assert!(info.can_retry);
        assert!(info.user_message.contains("weird"));
    }

    #[test]
    fn test_is_deterministic() {
        let a = categorize_message("disk full", Some(Path::new("/a.wav")));
        let b = categorize_message("disk full", Some(Path::new("/a.wav")));
        assert_eq!(a, b);
    }
}
