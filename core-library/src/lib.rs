//! # Sample Library Module
//!
//! Owns the sample library database: kits, their voices, and the sample
//! assigned to each voice slot.
//!
//! - SQLite schema and migrations
//! - `KitRepository` and `SampleRepository` over `sqlx`
//! - the `modified_since_sync` flag the sync engine reads and clears

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{Kit, Sample};
pub use repositories::{KitRepository, SampleRepository, SqliteKitRepository, SqliteSampleRepository};
