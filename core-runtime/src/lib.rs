//! # Core Runtime Module
//!
//! Runtime infrastructure shared by every core crate:
//! - logging and tracing setup
//! - configuration and capability injection
//! - the event bus that carries sync progress to the host
//!
//! Nothing here knows how a sync works; `core-sync` builds on these pieces.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
