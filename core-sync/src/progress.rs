//! # Progress Tracker
//!
//! Owns the single in-flight [`SyncJob`] and publishes a [`SyncProgress`]
//! snapshot on the [`EventBus`] after every change.
//!
//! Snapshots are cumulative, so a slow subscriber that lags simply skips
//! to a newer one. Emitting with no subscribers is fine.

use crate::job::SyncJob;
use crate::operation::FileOperation;
use crate::{Result, SyncError};
use bridge_traits::time::Clock;
use core_runtime::events::{
    CoreEvent, EventBus, SyncErrorDetails, SyncEvent, SyncProgress, SyncStatus,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

pub struct ProgressTracker {
    job: Mutex<Option<SyncJob>>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
}

impl ProgressTracker {
    pub fn new(event_bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            job: Mutex::new(None),
            event_bus,
            clock,
        }
    }

    /// Start a fresh job, replacing any previous one, and emit the
    /// `Preparing` snapshot.
    pub fn initialize_sync_job(
        &self,
        operations: Vec<FileOperation>,
        total_bytes: u64,
    ) -> SyncProgress {
        let mut guard = self.job.lock();
        if let Some(previous) = guard.as_ref() {
            warn!(job_id = %previous.id, "Replacing an unfinished sync job");
        }
        self.start_job(&mut guard, operations, total_bytes)
    }

    /// Like [`initialize_sync_job`](Self::initialize_sync_job) but refuses to
    /// replace an active job. Check and create happen under one lock.
    pub fn try_initialize_sync_job(
        &self,
        operations: Vec<FileOperation>,
        total_bytes: u64,
    ) -> Result<SyncProgress> {
        let mut guard = self.job.lock();
        if let Some(active) = guard.as_ref() {
            return Err(SyncError::SyncInProgress {
                job_id: active.id.as_str(),
            });
        }
        Ok(self.start_job(&mut guard, operations, total_bytes))
    }

    fn start_job(
        &self,
        slot: &mut Option<SyncJob>,
        operations: Vec<FileOperation>,
        total_bytes: u64,
    ) -> SyncProgress {
        let now = self.clock.unix_timestamp_millis();
        let job = SyncJob::new(operations, total_bytes, now);
        info!(
            job_id = %job.id,
            total_files = job.total_files,
            total_bytes,
            kits = job.kit_names.len(),
            "Sync job initialized"
        );
        let snapshot = job.snapshot("", SyncStatus::Preparing, now, None, None);
        *slot = Some(job);
        self.emit(&snapshot);
        snapshot
    }

    /// Record progress on `current_file` and emit a snapshot.
    ///
    /// Bytes are only counted for non-error updates, and a file only counts
    /// as completed at 100%. An `Error` update counts one failed file and
    /// marks its kit as failed without ending the job. Returns `None` when
    /// no job is active.
    pub fn update_progress(
        &self,
        current_file: &str,
        bytes_delta: u64,
        status: SyncStatus,
        file_progress: Option<u8>,
        error_details: Option<SyncErrorDetails>,
    ) -> Option<SyncProgress> {
        let mut guard = self.job.lock();
        let job = guard.as_mut()?;

        if status == SyncStatus::Error {
            job.failed_files = job.failed_files.saturating_add(1);
            if let Some(kit) = kit_of_failure(job, current_file, error_details.as_ref()) {
                job.failed_kits.insert(kit);
            }
            if error_details.is_some() {
                job.last_error = error_details.clone();
            }
        } else {
            job.bytes_transferred = job.bytes_transferred.saturating_add(bytes_delta);
            if file_progress == Some(100) {
                job.completed_files = job.completed_files.saturating_add(1).min(job.total_files);
            }
            if status.is_transferring() && job.status != status {
                if let Err(e) = job.transition(status) {
                    warn!(error = %e, "Ignoring progress status change");
                }
            }
        }

        let snapshot = job.snapshot(
            current_file,
            status,
            self.clock.unix_timestamp_millis(),
            file_progress,
            error_details,
        );
        trace!(
            file = current_file,
            completed = snapshot.files_completed,
            failed = snapshot.files_failed,
            "Progress updated"
        );
        self.emit(&snapshot);
        Some(snapshot)
    }

    /// Request cancellation. Takes effect at the next file boundary.
    pub fn cancel_sync(&self) -> bool {
        match self.job.lock().as_ref() {
            Some(job) => {
                job.cancel();
                info!(job_id = %job.id, "Sync cancellation requested");
                true
            }
            None => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.job.lock().as_ref().map_or(false, SyncJob::is_cancelled)
    }

    pub fn has_active_job(&self) -> bool {
        self.job.lock().is_some()
    }

    pub fn active_job_id(&self) -> Option<String> {
        self.job.lock().as_ref().map(|job| job.id.as_str())
    }

    /// Kits with at least one failed file in the active job.
    pub fn failed_kits(&self) -> BTreeSet<String> {
        self.job
            .lock()
            .as_ref()
            .map(|job| job.failed_kits.clone())
            .unwrap_or_default()
    }

    /// Latest state of the active job without emitting anything.
    pub fn snapshot(&self) -> Option<SyncProgress> {
        let guard = self.job.lock();
        let job = guard.as_ref()?;
        Some(job.snapshot(
            "",
            job.status,
            self.clock.unix_timestamp_millis(),
            None,
            None,
        ))
    }

    /// Mark the active job as unable to finish. The next
    /// [`complete_sync`](Self::complete_sync) then ends it with `Error`
    /// unless it was cancelled first.
    pub fn mark_fatal(&self, error_details: Option<SyncErrorDetails>) -> bool {
        match self.job.lock().as_mut() {
            Some(job) => {
                job.fatal = true;
                job.fatal_error = error_details;
                true
            }
            None => false,
        }
    }

    /// Record that every operation has been attempted. A cancellation that
    /// arrives afterwards no longer changes the terminal status.
    pub fn mark_queue_drained(&self) -> bool {
        match self.job.lock().as_mut() {
            Some(job) => {
                job.queue_drained = true;
                true
            }
            None => false,
        }
    }

    /// End the job at once with a terminal `Error` snapshot.
    pub fn fail_sync(&self, error_details: Option<SyncErrorDetails>) -> Option<SyncProgress> {
        if !self.mark_fatal(error_details) {
            return None;
        }
        self.complete_sync()
    }

    /// Emit the final snapshot and discard the job.
    ///
    /// Status is `Cancelled` if cancellation was requested before the queue
    /// drained, `Error` if the
    /// job was marked fatal, `Completed` otherwise. A second call finds no
    /// job and emits nothing.
    pub fn complete_sync(&self) -> Option<SyncProgress> {
        let mut job = self.job.lock().take()?;
        let status = job.final_status();
        if let Err(e) = job.transition(status) {
            warn!(error = %e, "Completing job from unexpected state");
        }
        // The final snapshot carries the failure that ended the job, or the
        // last per-file failure of a job that finished anyway.
        let error_details = match status {
            SyncStatus::Error => job.fatal_error.take().or_else(|| job.last_error.take()),
            SyncStatus::Completed => job.last_error.take(),
            _ => None,
        };
        let snapshot = job.snapshot(
            "",
            status,
            self.clock.unix_timestamp_millis(),
            Some(100),
            error_details,
        );
        if status == SyncStatus::Error {
            warn!(
                job_id = %job.id,
                completed = job.completed_files,
                failed = job.failed_files,
                "Sync job failed"
            );
        } else {
            info!(
                job_id = %job.id,
                status = %status,
                completed = job.completed_files,
                failed = job.failed_files,
                bytes = job.bytes_transferred,
                elapsed_ms = snapshot.elapsed_ms,
                "Sync job finished"
            );
        }
        self.emit(&snapshot);
        Some(snapshot)
    }

    fn emit(&self, snapshot: &SyncProgress) {
        let event = CoreEvent::Sync(SyncEvent::Progress(snapshot.clone()));
        if self.event_bus.emit(event).is_err() {
            debug!("No progress subscribers");
        }
    }
}

fn kit_of_failure(
    job: &SyncJob,
    current_file: &str,
    details: Option<&SyncErrorDetails>,
) -> Option<String> {
    job.operations
        .iter()
        .find(|op| match details {
            Some(d) => op.source_path.to_string_lossy() == d.file_path.as_str(),
            None => op.filename == current_file,
        })
        .or_else(|| job.operations.iter().find(|op| op.filename == current_file))
        .map(|op| op.kit_name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::FixedClock;
    use chrono::{TimeZone, Utc};
    use core_runtime::events::{ErrorCategory, EventStream, OperationKind};

    fn tracker() -> (ProgressTracker, EventStream) {
        let bus = EventBus::new(64);
        let stream = EventStream::new(bus.subscribe());
        let clock = FixedClock(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
        (ProgressTracker::new(bus, Arc::new(clock)), stream)
    }

    fn ops() -> Vec<FileOperation> {
        vec![
            FileOperation::copy("A0", "/s/kick.wav", "/d/A0/1kick.wav"),
            FileOperation::copy("A1", "/s/snare.wav", "/d/A1/2snare.wav"),
        ]
    }

    fn drain(stream: &mut EventStream) -> Vec<SyncProgress> {
        let mut out = Vec::new();
        while let Some(Ok(CoreEvent::Sync(SyncEvent::Progress(p)))) = stream.try_recv() {
            out.push(p);
        }
        out
    }

    #[test]
    fn test_initialize_emits_preparing() {
        let (tracker, mut stream) = tracker();
        let snap = tracker.initialize_sync_job(ops(), 300);
        assert_eq!(snap.status, SyncStatus::Preparing);
        assert_eq!(snap.total_files, 2);
        assert_eq!(snap.total_bytes, 300);
        assert!(tracker.has_active_job());
        assert_eq!(drain(&mut stream).len(), 1);
    }

    #[test]
    fn test_try_initialize_rejects_active_job() {
        let (tracker, _stream) = tracker();
        tracker.try_initialize_sync_job(ops(), 0).unwrap();
        let err = tracker.try_initialize_sync_job(ops(), 0).unwrap_err();
        assert!(matches!(err, SyncError::SyncInProgress { .. }));
    }

    #[test]
    fn test_initialize_overwrites_previous_job() {
        let (tracker, _stream) = tracker();
        let first = tracker.initialize_sync_job(ops(), 10);
        tracker.update_progress("kick.wav", 10, SyncStatus::Copying, Some(100), None);
        let second = tracker.initialize_sync_job(ops(), 20);
        assert_ne!(first.job_id, second.job_id);
        assert_eq!(second.files_completed, 0);
        assert_eq!(second.bytes_transferred, 0);
    }

    #[test]
    fn test_partial_progress_does_not_complete_file() {
        let (tracker, _stream) = tracker();
        tracker.initialize_sync_job(ops(), 300);
        let snap = tracker
            .update_progress("kick.wav", 50, SyncStatus::Copying, Some(40), None)
            .unwrap();
        assert_eq!(snap.files_completed, 0);
        assert_eq!(snap.bytes_transferred, 50);
        let snap = tracker
            .update_progress("kick.wav", 50, SyncStatus::Copying, Some(100), None)
            .unwrap();
        assert_eq!(snap.files_completed, 1);
        assert_eq!(snap.bytes_transferred, 100);
    }

    #[test]
    fn test_counters_are_monotonic() {
        let (tracker, mut stream) = tracker();
        tracker.initialize_sync_job(ops(), 300);
        tracker.update_progress("kick.wav", 100, SyncStatus::Copying, Some(100), None);
        let details = SyncErrorDetails {
            file_path: "/s/snare.wav".to_string(),
            operation: OperationKind::Copy,
            error: "snare.wav: Permission denied".to_string(),
            category: ErrorCategory::AccessDenied,
            can_retry: true,
        };
        tracker.update_progress("snare.wav", 999, SyncStatus::Error, None, Some(details));
        tracker.update_progress("snare.wav", 0, SyncStatus::Converting, Some(100), None);
        tracker.complete_sync();

        let snaps = drain(&mut stream);
        assert_eq!(snaps.len(), 5);
        for pair in snaps.windows(2) {
            assert!(pair[1].bytes_transferred >= pair[0].bytes_transferred);
            assert!(pair[1].files_completed >= pair[0].files_completed);
        }
        // Error updates never add bytes.
        assert_eq!(snaps[2].bytes_transferred, 100);
        assert_eq!(snaps[2].files_failed, 1);
    }

    #[test]
    fn test_error_update_marks_kit_failed() {
        let (tracker, _stream) = tracker();
        tracker.initialize_sync_job(ops(), 0);
        let details = SyncErrorDetails {
            file_path: "/s/snare.wav".to_string(),
            operation: OperationKind::Copy,
            error: "boom".to_string(),
            category: ErrorCategory::Other,
            can_retry: true,
        };
        let snap = tracker
            .update_progress("snare.wav", 0, SyncStatus::Error, None, Some(details))
            .unwrap();
        assert_eq!(snap.status, SyncStatus::Error);
        assert!(snap.error_details.is_some());
        assert_eq!(tracker.failed_kits().into_iter().collect::<Vec<_>>(), vec!["A1"]);
        // The job itself keeps going.
        assert!(tracker.has_active_job());

        let last = tracker.complete_sync().unwrap();
        assert_eq!(last.status, SyncStatus::Completed);
        assert_eq!(last.files_failed, 1);
        assert_eq!(last.error_details.unwrap().file_path, "/s/snare.wav");
    }

    #[test]
    fn test_cancel_and_is_cancelled() {
        let (tracker, _stream) = tracker();
        assert!(!tracker.cancel_sync());
        assert!(!tracker.is_cancelled());

        tracker.initialize_sync_job(ops(), 0);
        assert!(tracker.cancel_sync());
        assert!(tracker.is_cancelled());

        let last = tracker.complete_sync().unwrap();
        assert_eq!(last.status, SyncStatus::Cancelled);
        assert!(!tracker.is_cancelled());
    }

    #[test]
    fn test_complete_is_idempotent() {
        let (tracker, mut stream) = tracker();
        tracker.initialize_sync_job(ops(), 0);
        let first = tracker.complete_sync().unwrap();
        assert_eq!(first.status, SyncStatus::Completed);
        assert_eq!(first.current_file_progress, Some(100));
        assert!(tracker.complete_sync().is_none());
        assert!(!tracker.has_active_job());
        assert_eq!(drain(&mut stream).len(), 2);
    }

    #[test]
    fn test_cancel_wins_over_fatal() {
        let (tracker, _stream) = tracker();
        tracker.initialize_sync_job(ops(), 0);
        assert!(tracker.mark_fatal(None));
        tracker.cancel_sync();
        assert_eq!(tracker.complete_sync().unwrap().status, SyncStatus::Cancelled);
        assert!(!tracker.mark_fatal(None));
    }

    #[test]
    fn test_late_cancel_on_drained_queue_completes() {
        let (tracker, _stream) = tracker();
        tracker.initialize_sync_job(ops(), 0);
        tracker.update_progress("kick.wav", 0, SyncStatus::Copying, Some(100), None);
        tracker.update_progress("snare.wav", 0, SyncStatus::Copying, Some(100), None);
        tracker.cancel_sync();
        assert!(tracker.mark_queue_drained());
        let last = tracker.complete_sync().unwrap();
        assert_eq!(last.status, SyncStatus::Completed);
        assert_eq!(last.files_completed, 2);
        assert!(!tracker.mark_queue_drained());
    }

    #[test]
    fn test_update_without_job_is_noop() {
        let (tracker, mut stream) = tracker();
        assert!(tracker
            .update_progress("x.wav", 1, SyncStatus::Copying, Some(100), None)
            .is_none());
        assert!(drain(&mut stream).is_empty());
    }

    #[test]
    fn test_fail_sync_is_terminal() {
        let (tracker, _stream) = tracker();
        tracker.initialize_sync_job(ops(), 0);
        let snap = tracker.fail_sync(None).unwrap();
        assert_eq!(snap.status, SyncStatus::Error);
        assert!(!tracker.has_active_job());
        assert!(tracker.complete_sync().is_none());
    }
}
