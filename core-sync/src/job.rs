//! # Sync Job State Machine
//!
//! A [`SyncJob`] is the mutable state of one in-flight sync. It is owned by
//! the [`ProgressTracker`](crate::progress::ProgressTracker); the outside
//! world only sees [`SyncProgress`] snapshots taken from it.
//!
//! ## State Machine
//!
//! ```text
//! Preparing → Copying ⇄ Converting → Completed
//!     │          │          │      ↘ Cancelled
//!     └──────────┴──────────┴──────→ Error
//! ```
//!
//! A failed file does not move the job to `Error`; only a failure that stops
//! the whole job does.

use crate::operation::{kit_names_of, FileOperation};
use crate::{Result, SyncError};
use core_runtime::events::{SyncErrorDetails, SyncProgress, SyncStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncJobId(Uuid);

impl SyncJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| SyncError::InvalidJobId(e.to_string()))?,
        ))
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Sync Job
// ============================================================================

#[derive(Debug, Clone)]
pub struct SyncJob {
    pub id: SyncJobId,
    /// Kits touched by this job, in first-seen order
    pub kit_names: Vec<String>,
    pub operations: Vec<FileOperation>,
    pub total_files: u32,
    pub completed_files: u32,
    pub failed_files: u32,
    pub total_bytes: u64,
    pub bytes_transferred: u64,
    /// Wall-clock start in Unix milliseconds
    pub started_at_ms: i64,
    pub status: SyncStatus,
    /// Kits with at least one failed file
    pub failed_kits: BTreeSet<String>,
    /// Set when the job as a whole cannot finish; it then ends in `Error`.
    pub fatal: bool,
    pub fatal_error: Option<SyncErrorDetails>,
    /// Most recent per-file failure
    pub last_error: Option<SyncErrorDetails>,
    /// Every operation was attempted; a cancel arriving after that is moot.
    pub queue_drained: bool,
    cancellation: CancellationToken,
}

impl SyncJob {
    pub fn new(operations: Vec<FileOperation>, total_bytes: u64, started_at_ms: i64) -> Self {
        Self {
            id: SyncJobId::new(),
            kit_names: kit_names_of(&operations),
            total_files: u32::try_from(operations.len()).unwrap_or(u32::MAX),
            operations,
            completed_files: 0,
            failed_files: 0,
            total_bytes,
            bytes_transferred: 0,
            started_at_ms,
            status: SyncStatus::Preparing,
            failed_kits: BTreeSet::new(),
            fatal: false,
            fatal_error: None,
            last_error: None,
            queue_drained: false,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Move to `to`, rejecting transitions the state machine does not allow.
    pub fn transition(&mut self, to: SyncStatus) -> Result<()> {
        self.validate_transition(to)?;
        self.status = to;
        Ok(())
    }

    /// Terminal status this job ends with if finished now.
    pub fn final_status(&self) -> SyncStatus {
        if self.is_cancelled() && !self.queue_drained {
            SyncStatus::Cancelled
        } else if self.fatal {
            SyncStatus::Error
        } else {
            SyncStatus::Completed
        }
    }

    pub fn elapsed_ms(&self, now_ms: i64) -> u64 {
        u64::try_from(now_ms.saturating_sub(self.started_at_ms)).unwrap_or(0)
    }

    /// Snapshot of the job as it stands.
    pub fn snapshot(
        &self,
        current_file: &str,
        status: SyncStatus,
        now_ms: i64,
        current_file_progress: Option<u8>,
        error_details: Option<SyncErrorDetails>,
    ) -> SyncProgress {
        SyncProgress {
            job_id: self.id.as_str(),
            current_file: current_file.to_string(),
            files_completed: self.completed_files,
            files_failed: self.failed_files,
            total_files: self.total_files,
            bytes_transferred: self.bytes_transferred,
            total_bytes: self.total_bytes,
            elapsed_ms: self.elapsed_ms(now_ms),
            status,
            current_file_progress,
            error_details,
        }
    }

    fn validate_transition(&self, to: SyncStatus) -> Result<()> {
        use SyncStatus::*;

        let valid = match (self.status, to) {
            (Preparing, Copying | Converting | Completed | Cancelled | Error) => true,
            (Copying | Converting, Copying | Converting) => true,
            (Copying | Converting, Completed | Cancelled | Error) => true,
            _ => false,
        };

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.status.as_str(),
                    to.as_str()
                ),
            });
        }
        Ok(())
    }
}
