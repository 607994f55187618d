//! Errors raised while assembling the core: bad configuration values and
//! host bridges that were never provided.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value is missing or out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A stored or user-supplied error policy name that is not recognised.
    #[error("Unknown sync error policy '{0}', expected 'continue' or 'abort'")]
    UnknownErrorPolicy(String),

    /// The host did not supply a bridge the sync engine needs.
    #[error("No {capability} provided: {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
