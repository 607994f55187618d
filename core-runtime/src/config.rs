//! # Core Configuration Module
//!
//! Builder-based configuration for the sync core.
//!
//! ## Required Dependencies
//!
//! - `SettingsStore` - holds the local-store and SD card locations
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `FileSystemAccess` - desktop default: `TokioFileSystem` (`desktop-shims`)
//! - `Clock` - defaults to `SystemClock`
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, SyncErrorPolicy};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/romper.sqlite")
//!     .settings_store(Arc::new(my_settings))
//!     .error_policy(SyncErrorPolicy::AbortOnError)
//!     .build()?;
//! ```
//!
//! Missing capabilities fail at `build()` with an actionable
//! [`Error::CapabilityMissing`] instead of at the first sync.

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, FileSystemAccess, SettingsStore, SystemClock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Upper bound for the progress channel buffer.
const MAX_EVENT_BUFFER_SIZE: usize = 10_000;

/// What the sync loop does after a file fails.
///
/// Disk-full failures stop the queue under either policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorPolicy {
    /// Record the failure and move on to the next file.
    #[default]
    ContinueOnError,
    /// Stop processing the queue after the first failure.
    AbortOnError,
}

impl SyncErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncErrorPolicy::ContinueOnError => "continue",
            SyncErrorPolicy::AbortOnError => "abort",
        }
    }
}

impl FromStr for SyncErrorPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" | "continue_on_error" => Ok(SyncErrorPolicy::ContinueOnError),
            "abort" | "abort_on_error" => Ok(SyncErrorPolicy::AbortOnError),
            other => Err(Error::UnknownErrorPolicy(other.to_string())),
        }
    }
}

/// Sync behavior defaults. Per-user settings in the `SettingsStore` win over
/// these when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOptions {
    pub error_policy: SyncErrorPolicy,
    /// Downmix stereo samples to mono when the user has no stored preference.
    pub default_to_mono: bool,
}

/// Core configuration. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// SQLite database holding kits, voices and samples
    pub database_path: PathBuf,

    pub file_system: Arc<dyn FileSystemAccess>,

    pub settings_store: Arc<dyn SettingsStore>,

    pub clock: Arc<dyn Clock>,

    /// Capacity of the progress broadcast channel
    pub event_buffer_size: usize,

    pub sync: SyncOptions,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("file_system", &"FileSystemAccess { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("clock", &"Clock { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .field("sync", &self.sync)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks values the builder cannot enforce by type.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }
}

fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required to read the local store and \
                 SD card paths. Desktop: open a bridge_desktop::SqliteSettingsStore and \
                 pass it to .settings_store()."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::new());
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "No FileSystemAccess implementation provided. \
                 Desktop: enable the 'desktop-shims' feature to use TokioFileSystem. \
                 Other hosts: inject an adapter with .file_system()."
            .to_string(),
    })
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
    sync: SyncOptions,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder().database_path("/path/to/romper.sqlite");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the file system implementation. Optional with `desktop-shims`.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the settings store implementation (required).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Capacity of the progress channel. Default: 100.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn error_policy(mut self, policy: SyncErrorPolicy) -> Self {
        self.sync.error_policy = policy;
        self
    }

    pub fn default_to_mono(mut self, mono: bool) -> Self {
        self.sync.default_to_mono = mono;
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// - `Config` when the database path is missing or a value is out of range
    /// - `CapabilityMissing` when a required bridge has no implementation
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let settings_store = self.settings_store.ok_or_else(settings_store_missing_error)?;

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let config = CoreConfig {
            database_path,
            file_system,
            settings_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            sync: self.sync,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::storage::FileMetadata;
    use std::path::Path;

    struct NullSettings;

    #[async_trait]
    impl SettingsStore for NullSettings {
        async fn set_string(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn get_string(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }
        async fn set_bool(&self, _key: &str, _value: bool) -> BridgeResult<()> {
            Ok(())
        }
        async fn get_bool(&self, _key: &str) -> BridgeResult<Option<bool>> {
            Ok(None)
        }
        async fn delete(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    struct NullFs;

    #[async_trait]
    impl FileSystemAccess for NullFs {
        async fn exists(&self, _path: &Path) -> BridgeResult<bool> {
            Ok(false)
        }
        async fn metadata(&self, _path: &Path) -> BridgeResult<FileMetadata> {
            Err(bridge_traits::BridgeError::NotAvailable("metadata".into()))
        }
        async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn copy_file(&self, _source: &Path, _destination: &Path) -> BridgeResult<u64> {
            Ok(0)
        }
        async fn delete_file(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn list_directory(&self, _path: &Path) -> BridgeResult<Vec<PathBuf>> {
            Ok(Vec::new())
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .database_path("/tmp/romper.sqlite")
            .settings_store(Arc::new(NullSettings))
            .file_system(Arc::new(NullFs))
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = complete_builder().build().unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/romper.sqlite"));
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert_eq!(config.sync.error_policy, SyncErrorPolicy::ContinueOnError);
        assert!(!config.sync.default_to_mono);
    }

    #[test]
    fn test_builder_requires_database_path() {
        let result = CoreConfig::builder()
            .settings_store(Arc::new(NullSettings))
            .file_system(Arc::new(NullFs))
            .build();

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("Database path")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_requires_settings_store() {
        let result = CoreConfig::builder()
            .database_path("/tmp/romper.sqlite")
            .file_system(Arc::new(NullFs))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "SettingsStore")
            }
            other => panic!("expected capability error, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_file_system_without_shims() {
        let result = CoreConfig::builder()
            .database_path("/tmp/romper.sqlite")
            .settings_store(Arc::new(NullSettings))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "FileSystemAccess"
        ));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_builder_defaults_file_system_with_shims() {
        let result = CoreConfig::builder()
            .database_path("/tmp/romper.sqlite")
            .settings_store(Arc::new(NullSettings))
            .build();

        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_event_buffer_bounds() {
        assert!(matches!(
            complete_builder().event_buffer_size(0).build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            complete_builder().event_buffer_size(MAX_EVENT_BUFFER_SIZE + 1).build(),
            Err(Error::Config(_))
        ));
        assert!(complete_builder().event_buffer_size(16).build().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_database_path() {
        let result = complete_builder().database_path("").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_sync_options_from_builder() {
        let config = complete_builder()
            .error_policy(SyncErrorPolicy::AbortOnError)
            .default_to_mono(true)
            .build()
            .unwrap();

        assert_eq!(config.sync.error_policy, SyncErrorPolicy::AbortOnError);
        assert!(config.sync.default_to_mono);
    }

    #[test]
    fn test_error_policy_parsing() {
        assert_eq!(
            "continue".parse::<SyncErrorPolicy>().unwrap(),
            SyncErrorPolicy::ContinueOnError
        );
        assert_eq!(
            " ABORT ".parse::<SyncErrorPolicy>().unwrap(),
            SyncErrorPolicy::AbortOnError
        );
        match "Retry".parse::<SyncErrorPolicy>() {
            Err(Error::UnknownErrorPolicy(name)) => assert_eq!(name, "retry"),
            other => panic!("expected unknown policy, got {:?}", other),
        }
        assert_eq!(SyncErrorPolicy::AbortOnError.as_str(), "abort");
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = complete_builder().build().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("SettingsStore { ... }"));
        assert!(debug.contains("romper.sqlite"));
    }
}
