use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Settings store error: {0}")]
    Settings(String),

    #[error("Path not accessible: {}", path.display())]
    PathNotAccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// The underlying I/O error, if this failure came from the filesystem.
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            BridgeError::Io(err) => Some(err),
            BridgeError::PathNotAccessible { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn io_error_is_exposed_for_filesystem_failures() {
        let err = BridgeError::PathNotAccessible {
            path: PathBuf::from("/mnt/sd/kit"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(
            err.io_error().map(|e| e.kind()),
            Some(io::ErrorKind::PermissionDenied)
        );
        assert!(err.to_string().contains("/mnt/sd/kit"));

        let err = BridgeError::Settings("locked".into());
        assert!(err.io_error().is_none());
    }
}
