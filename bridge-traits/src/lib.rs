//! # Host Bridge Traits
//!
//! Capabilities the sync core needs from its host, expressed as traits so the
//! core never touches the platform directly.
//!
//! ## Traits
//!
//! - [`FileSystemAccess`](storage::FileSystemAccess) - stat, copy, directory creation
//! - [`SettingsStore`](storage::SettingsStore) - key-value preferences (SD card path, mono default)
//! - [`Clock`](time::Clock) - wall-clock source for job timestamps
//! - [`LoggerSink`](time::LoggerSink) - forward structured logs to host logging
//!
//! The desktop implementations live in `bridge-desktop`.
//!
//! ## Fail-Fast Strategy
//!
//! The core fails with `CapabilityMissing` at construction time when a
//! required bridge is absent, rather than at the first sync.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; a single instance is shared by the
//! planner, the executor and the settings loader.

pub mod error;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use storage::{FileMetadata, FileSystemAccess, SettingsStore};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
