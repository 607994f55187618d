//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux):
//! - `FileSystemAccess` using `tokio::fs`
//! - `SettingsStore` using a SQLite-backed key-value table
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{SqliteSettingsStore, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() {
//!     let fs = TokioFileSystem::new();
//!     let settings = SqliteSettingsStore::new(bridge_desktop::default_data_dir().join("settings.db"))
//!         .await
//!         .unwrap();
//! }
//! ```

mod filesystem;
mod settings;

pub use filesystem::TokioFileSystem;
pub use settings::SqliteSettingsStore;

use std::path::PathBuf;

/// Per-user application data directory, e.g. `~/.local/share/rample-sync`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("share")
        })
        .join("rample-sync")
}
