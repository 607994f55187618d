//! # Kit Sync Engine
//!
//! Writes sample kits from the local store onto a Rample SD card.
//!
//! ## Components
//!
//! - **Planner** (`planner`): turns the database's sample references into
//!   ordered copy/convert operations and a change summary
//! - **Executor** (`executor`): performs one operation and categorizes its
//!   failure, if any
//! - **Progress Tracker** (`progress`): owns the single active job and
//!   publishes progress snapshots
//! - **Error Categorizer** (`categorizer`): maps raw errors to user-facing
//!   categories
//! - **Sync Service** (`coordinator`): drives a job from start to finish
//!   and marks synced kits in the database

pub mod categorizer;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod job;
pub mod operation;
pub mod planner;
pub mod progress;
pub mod settings;

pub use categorizer::{categorize_error, categorize_message};
pub use coordinator::SyncService;
pub use error::{Result, SyncError};
pub use executor::SyncExecutor;
pub use job::{SyncJob, SyncJobId};
pub use operation::{
    FailedFile, FileOperation, FileOperationResult, SyncChangeSummary, SyncData, SyncErrorInfo,
    SyncReport, ValidationError, ValidationErrorKind,
};
pub use planner::{destination_path, FileOperationPlanner, SyncPlan};
pub use progress::ProgressTracker;
pub use settings::SyncSettings;

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use core_audio::{AudioError, ConversionOptions, FormatConverter};
    use core_library::db::create_test_pool;
    use core_library::{KitRepository, SampleRepository, SqliteKitRepository, SqliteSampleRepository};
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::path::Path;
    use std::sync::Arc;

    pub async fn library() -> (Arc<dyn KitRepository>, Arc<dyn SampleRepository>) {
        let pool = create_test_pool().await.unwrap();
        (
            Arc::new(SqliteKitRepository::new(pool.clone())),
            Arc::new(SqliteSampleRepository::new(pool)),
        )
    }

    /// Silent PCM WAV with the given layout.
    pub fn write_wav(path: &Path, sample_rate: u32, bits: u16, channels: u16, frames: u32) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: bits,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for _ in 0..frames * u32::from(channels) {
            writer.write_sample(0i32).unwrap();
        }
        writer.finalize().unwrap();
    }

    /// Converter that always fails with the error built by `make_error`.
    pub struct StubConverter {
        make_error: Box<dyn Fn() -> AudioError + Send + Sync>,
    }

    impl StubConverter {
        pub fn failing(make_error: impl Fn() -> AudioError + Send + Sync + 'static) -> Self {
            Self {
                make_error: Box::new(make_error),
            }
        }
    }

    #[async_trait]
    impl FormatConverter for StubConverter {
        async fn convert(
            &self,
            _source: &Path,
            _destination: &Path,
            _options: ConversionOptions,
        ) -> core_audio::Result<()> {
            Err((self.make_error)())
        }
    }
}
