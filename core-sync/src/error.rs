use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("A sync is already in progress (job {job_id})")]
    SyncInProgress { job_id: String },

    #[error("No SD card path configured")]
    NoSdCardPath,

    #[error("No local store path configured")]
    NoLocalStorePath,

    #[error("SD card at {path} is not available: {message}")]
    DestinationUnavailable { path: PathBuf, message: String },

    #[error("Invalid job ID: {0}")]
    InvalidJobId(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Audio error: {0}")]
    Audio(#[from] core_audio::AudioError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
