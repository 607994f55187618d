//! # Sync Service
//!
//! Top-level coordinator for writing kits to the SD card.
//!
//! ## Workflow
//!
//! 1. `generate_change_summary` plans every kit modified since the last
//!    sync and reports what would be copied or converted.
//! 2. `start_kit_sync` takes the planned lists, creates the job and walks
//!    the operations one at a time, in the order given.
//! 3. Cancellation is checked before each operation; a file already in
//!    flight always finishes. A cancel that arrives during the last file
//!    is ignored, so the report, the final event and the database agree.
//! 4. Kits whose files all made it to the card are marked as synced in the
//!    database; the rest stay modified.
//!
//! ## Failure handling
//!
//! Per-file failures are reported on the progress stream and in the
//! returned [`SyncReport`]. Under [`SyncErrorPolicy::ContinueOnError`] the
//! queue keeps going; under [`SyncErrorPolicy::AbortOnError`] it stops at
//! the first failure. A full disk stops the queue under either policy. An
//! unreachable SD card root fails the request before any file is touched.

use crate::categorizer::categorize_error;
use crate::executor::SyncExecutor;
use crate::operation::{FailedFile, FileOperation, SyncChangeSummary, SyncData, SyncReport};
use crate::planner::FileOperationPlanner;
use crate::progress::ProgressTracker;
use crate::settings::SyncSettings;
use crate::{Result, SyncError};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::Clock;
use core_audio::FormatConverter;
use core_library::{KitRepository, SampleRepository};
use core_runtime::config::SyncErrorPolicy;
use core_runtime::events::{
    CoreEvent, ErrorCategory, EventBus, LibraryEvent, OperationKind, SyncErrorDetails,
    SyncStatus,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Why the loop stopped before the end of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Cancelled,
    PolicyAbort,
    DiskFull,
}

pub struct SyncService {
    planner: FileOperationPlanner,
    executor: SyncExecutor,
    tracker: ProgressTracker,
    kits: Arc<dyn KitRepository>,
    event_bus: EventBus,
}

impl SyncService {
    pub fn new(
        kits: Arc<dyn KitRepository>,
        samples: Arc<dyn SampleRepository>,
        file_system: Arc<dyn FileSystemAccess>,
        converter: Arc<dyn FormatConverter>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            planner: FileOperationPlanner::new(kits.clone(), samples, file_system.clone()),
            executor: SyncExecutor::new(file_system, converter),
            tracker: ProgressTracker::new(event_bus.clone(), clock),
            kits,
            event_bus,
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Summary of every kit modified since the last sync.
    ///
    /// # Errors
    ///
    /// `NoSdCardPath` / `NoLocalStorePath` when the paths are not
    /// configured, or any database error from planning.
    #[instrument(skip(self, settings))]
    pub async fn generate_change_summary(&self, settings: &SyncSettings) -> Result<SyncChangeSummary> {
        self.plan_kits(settings, &[]).await
    }

    /// Summary for specific kits, whether or not they are flagged modified.
    #[instrument(skip(self, settings))]
    pub async fn plan_kits(
        &self,
        settings: &SyncSettings,
        kit_names: &[String],
    ) -> Result<SyncChangeSummary> {
        let sd_root = settings.sd_card_path()?;
        let local_store = settings.local_store_path()?;
        let plan = self
            .planner
            .plan(
                kit_names,
                local_store,
                sd_root,
                settings.default_to_mono_samples,
            )
            .await?;
        let summary = plan.summary();
        info!(
            files = summary.file_count,
            kits = summary.kit_count,
            invalid = summary.validation_errors.len(),
            "Change summary generated"
        );
        Ok(summary)
    }

    /// Run a sync over the given operations.
    ///
    /// Copies run before conversions, each list in the order supplied.
    /// Returns once the job has finished; progress is pushed on the event
    /// bus throughout.
    ///
    /// # Errors
    ///
    /// - `SyncInProgress` if another job is active
    /// - `NoSdCardPath` if no SD card is configured
    /// - `DestinationUnavailable` if the SD card root cannot be reached; a
    ///   terminal `Error` snapshot is emitted and nothing is written
    /// - database errors while marking kits synced
    #[instrument(skip(self, settings, data), fields(files = data.len()))]
    pub async fn start_kit_sync(&self, settings: &SyncSettings, data: SyncData) -> Result<SyncReport> {
        if data.is_empty() {
            debug!("Nothing to sync");
            return Ok(SyncReport::empty());
        }
        let sd_root = settings.sd_card_path()?;
        if let Some(job_id) = self.tracker.active_job_id() {
            return Err(SyncError::SyncInProgress { job_id });
        }

        let operations = data.into_operations();

        if let Err(e) = self.executor.check_destination_root(sd_root).await {
            error!(error = %e, "SD card is not reachable");
            let first_kind = operations
                .first()
                .map_or(OperationKind::Copy, |op| op.operation);
            self.tracker.try_initialize_sync_job(operations, 0)?;
            self.tracker
                .fail_sync(Some(destination_details(&e, sd_root, first_kind)));
            return Err(e);
        }

        let total_bytes = self.executor.calculate_total_size(&operations).await;
        let initial = self
            .tracker
            .try_initialize_sync_job(operations.clone(), total_bytes)?;
        info!(
            job_id = %initial.job_id,
            files = operations.len(),
            total_bytes,
            policy = settings.error_policy.as_str(),
            "Kit sync started"
        );

        let mut report = SyncReport {
            job_id: Some(initial.job_id),
            ..SyncReport::default()
        };
        let (outcomes, stop) = self
            .run_operations(&operations, settings, &mut report)
            .await;

        match stop {
            Some(StopReason::Cancelled) => report.cancelled = true,
            Some(StopReason::PolicyAbort) | Some(StopReason::DiskFull) => {
                report.aborted = true;
                report.cancelled = self.tracker.is_cancelled();
                self.tracker
                    .mark_fatal(last_error_details(&report, &operations));
            }
            None => {
                // Every file was attempted, so a cancel that landed during
                // the last one has nothing left to stop.
                if self.tracker.is_cancelled() {
                    debug!("Cancel arrived after the last file; finishing normally");
                }
                self.tracker.mark_queue_drained();
                if report.files_completed == 0 && report.files_failed > 0 {
                    warn!("Every file failed");
                    self.tracker
                        .mark_fatal(last_error_details(&report, &operations));
                }
            }
        }

        let (synced, unsynced) = partition_kits(&operations, &outcomes);
        report.synced_kits = synced;
        report.unsynced_kits = unsynced;

        let marked = self.mark_synced(&report.synced_kits).await;
        self.tracker.complete_sync();
        marked?;

        info!(
            completed = report.files_completed,
            failed = report.files_failed,
            synced_kits = report.synced_kits.len(),
            cancelled = report.cancelled,
            aborted = report.aborted,
            "Kit sync finished"
        );
        Ok(report)
    }

    /// Walk the queue. Returns one entry per operation: `Some(true)` for a
    /// success, `Some(false)` for a failure, `None` when never attempted.
    async fn run_operations(
        &self,
        operations: &[FileOperation],
        settings: &SyncSettings,
        report: &mut SyncReport,
    ) -> (Vec<Option<bool>>, Option<StopReason>) {
        let mut outcomes = vec![None; operations.len()];

        for (index, op) in operations.iter().enumerate() {
            if self.tracker.is_cancelled() {
                info!(skipped = operations.len() - index, "Sync cancelled");
                return (outcomes, Some(StopReason::Cancelled));
            }

            let result = self
                .executor
                .execute_file_operation(op, settings.default_to_mono_samples)
                .await;

            if result.success {
                outcomes[index] = Some(true);
                report.files_completed += 1;
                report.bytes_transferred += result.bytes_transferred;
                self.tracker.update_progress(
                    &op.filename,
                    result.bytes_transferred,
                    op.operation.status(),
                    Some(100),
                    None,
                );
            } else {
                outcomes[index] = Some(false);
                report.files_failed += 1;
                let details = result.error_details(op);
                let category = details.as_ref().map_or(ErrorCategory::Other, |d| d.category);
                if let Some(d) = &details {
                    report.failures.push(FailedFile {
                        kit_name: op.kit_name.clone(),
                        filename: op.filename.clone(),
                        source_path: op.source_path.clone(),
                        error: d.error.clone(),
                        category: d.category,
                        can_retry: d.can_retry,
                    });
                }
                self.tracker
                    .update_progress(&op.filename, 0, SyncStatus::Error, None, details);

                if category == ErrorCategory::DiskFull {
                    error!(file = %op.filename, "SD card full, stopping sync");
                    return (outcomes, Some(StopReason::DiskFull));
                }
                if settings.error_policy == SyncErrorPolicy::AbortOnError {
                    warn!(file = %op.filename, "Stopping sync after failure");
                    return (outcomes, Some(StopReason::PolicyAbort));
                }
            }

            tokio::task::yield_now().await;
        }

        (outcomes, None)
    }

    async fn mark_synced(&self, kit_names: &[String]) -> Result<()> {
        if kit_names.is_empty() {
            return Ok(());
        }
        let updated = self.kits.mark_kits_synced(kit_names).await?;
        debug!(updated, "Kits marked as synced");
        if self
            .event_bus
            .emit(CoreEvent::Library(LibraryEvent::KitsSynced {
                kit_names: kit_names.to_vec(),
            }))
            .is_err()
        {
            debug!("No library subscribers");
        }
        Ok(())
    }

    /// Ask the running job to stop at the next file boundary.
    pub fn cancel_sync(&self) -> bool {
        self.tracker.cancel_sync()
    }

    pub fn has_active_job(&self) -> bool {
        self.tracker.has_active_job()
    }
}

/// Kits whose every operation succeeded, and the rest, in first-seen order.
fn partition_kits(
    operations: &[FileOperation],
    outcomes: &[Option<bool>],
) -> (Vec<String>, Vec<String>) {
    let mut kits: Vec<(&str, bool)> = Vec::new();
    for (op, outcome) in operations.iter().zip(outcomes) {
        let ok = *outcome == Some(true);
        match kits.iter_mut().find(|(name, _)| *name == op.kit_name) {
            Some((_, all_ok)) => *all_ok &= ok,
            None => kits.push((op.kit_name.as_str(), ok)),
        }
    }
    let (synced, unsynced): (Vec<_>, Vec<_>) = kits.into_iter().partition(|(_, ok)| *ok);
    (
        synced.into_iter().map(|(n, _)| n.to_string()).collect(),
        unsynced.into_iter().map(|(n, _)| n.to_string()).collect(),
    )
}

fn last_error_details(report: &SyncReport, operations: &[FileOperation]) -> Option<SyncErrorDetails> {
    let failure = report.failures.last()?;
    let operation = operations
        .iter()
        .find(|op| op.source_path == failure.source_path)
        .map_or(OperationKind::Copy, |op| op.operation);
    Some(SyncErrorDetails {
        file_path: failure.source_path.to_string_lossy().into_owned(),
        operation,
        error: failure.error.clone(),
        category: failure.category,
        can_retry: failure.can_retry,
    })
}

fn destination_details(err: &SyncError, root: &Path, operation: OperationKind) -> SyncErrorDetails {
    let info = categorize_error(err, Some(root));
    SyncErrorDetails {
        file_path: root.to_string_lossy().into_owned(),
        operation,
        error: err.to_string(),
        category: info.category,
        can_retry: true,
    }
}
