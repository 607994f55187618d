//! Storage and File System Abstractions
//!
//! Traits for the filesystem primitives the sync engine needs and for the
//! key-value settings store that holds the user's local-store and SD card
//! locations.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
    pub read_only: bool,
}

/// File system access trait
///
/// Every call is a single primitive: implementations must not retry or
/// partially succeed. Errors carry the originating `std::io::Error` so
/// callers can classify them (see [`BridgeError::io_error`]).
///
/// [`BridgeError::io_error`]: crate::error::BridgeError::io_error
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn stage(fs: &dyn FileSystemAccess, src: &Path, dst: &Path) -> Result<u64> {
///     if let Some(parent) = dst.parent() {
///         fs.create_dir_all(parent).await?;
///     }
///     fs.copy_file(src, dst).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Copy a file byte-for-byte, overwriting the destination.
    ///
    /// Returns the number of bytes written.
    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<u64>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Size of a file, or `None` when it cannot be read.
    async fn file_size(&self, path: &Path) -> Option<u64> {
        match self.metadata(path).await {
            Ok(meta) if !meta.is_directory => Some(meta.size),
            _ => None,
        }
    }
}

/// Key-value settings storage trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember_card(store: &dyn SettingsStore) -> Result<()> {
///     store.set_string("sdCardPath", "/Volumes/RAMPLE").await?;
///     store.set_bool("defaultToMonoSamples", true).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;

    /// List all setting keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.list_keys().await?.iter().any(|k| k == key))
    }
}
