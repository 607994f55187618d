//! # Repository Pattern Implementation
//!
//! Repository traits with SQLite implementations backed by `sqlx`.
//!
//! - `KitRepository` - kits and their `modified_since_sync` bookkeeping
//! - `SampleRepository` - sample slot assignments per kit
//!
//! Writes that change a kit's sample set also flag the kit as modified, so
//! the next change summary picks it up.

pub mod kit;
pub mod sample;

pub use kit::{KitRepository, SqliteKitRepository};
pub use sample::{SampleRepository, SqliteSampleRepository};
