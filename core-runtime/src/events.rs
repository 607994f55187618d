//! # Event Bus System
//!
//! Push channel from the core to the host UI, built on `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: `CoreEvent` wraps one enum per domain (sync, library)
//! - **EventBus**: cloneable broadcast sender shared by every producer
//! - **EventStream**: receiver wrapper with an optional filter
//!
//! ```text
//! ┌───────────────┐  emit   ┌───────────┐  subscribe  ┌──────────────┐
//! │ ProgressTracker├───────>│ EventBus  ├────────────>│ host window  │
//! └───────────────┘         │ (broadcast│             └──────────────┘
//! ┌───────────────┐  emit   │  channel) │  subscribe  ┌──────────────┐
//! │ SyncService   ├────────>│           ├────────────>│ test harness │
//! └───────────────┘         └───────────┘             └──────────────┘
//! ```
//!
//! ## Delivery semantics
//!
//! Progress snapshots are cumulative state, not deltas. A subscriber that
//! falls behind gets `RecvError::Lagged(n)` and simply continues with the
//! newest snapshots; nothing has to be replayed. Emitting with no subscriber
//! returns `Err(SendError)`, which producers ignore with `.ok()`.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
//!
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//! bus.emit(CoreEvent::Library(LibraryEvent::KitsSynced {
//!     kit_names: vec!["A0".into()],
//! }))
//! .ok();
//! assert!(rx.try_recv().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Host channel name for sync progress snapshots.
pub const SYNC_PROGRESS_CHANNEL: &str = "sync-progress";

/// Host channel name for library change notifications.
pub const LIBRARY_CHANNEL: &str = "library-changed";

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Sync(SyncEvent),
    Library(LibraryEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Name of the host channel this event is delivered on.
    pub fn channel(&self) -> &'static str {
        match self {
            CoreEvent::Sync(_) => SYNC_PROGRESS_CHANNEL,
            CoreEvent::Library(_) => LIBRARY_CHANNEL,
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Progress(p)) if p.status == SyncStatus::Error => {
                EventSeverity::Error
            }
            CoreEvent::Sync(SyncEvent::Progress(p)) if p.error_details.is_some() => {
                EventSeverity::Warning
            }
            CoreEvent::Sync(SyncEvent::Progress(p)) if p.status.is_terminal() => {
                EventSeverity::Info
            }
            CoreEvent::Library(LibraryEvent::KitsSynced { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Point-in-time snapshot of the running sync job.
    Progress(SyncProgress),
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Progress(p) => match p.status {
                SyncStatus::Preparing => "Sync preparing",
                SyncStatus::Copying => "Copying sample",
                SyncStatus::Converting => "Converting sample",
                SyncStatus::Completed => "Sync completed",
                SyncStatus::Cancelled => "Sync cancelled",
                SyncStatus::Error => "Sync error",
            },
        }
    }
}

/// Status of a sync job as reported to the UI.
///
/// `Cancelled` is its own terminal state, distinct from `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Preparing,
    Copying,
    Converting,
    Completed,
    Cancelled,
    Error,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::Completed | SyncStatus::Cancelled | SyncStatus::Error
        )
    }

    pub fn is_transferring(&self) -> bool {
        matches!(self, SyncStatus::Copying | SyncStatus::Converting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Preparing => "preparing",
            SyncStatus::Copying => "copying",
            SyncStatus::Converting => "converting",
            SyncStatus::Completed => "completed",
            SyncStatus::Cancelled => "cancelled",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preparing" => Ok(SyncStatus::Preparing),
            "copying" => Ok(SyncStatus::Copying),
            "converting" => Ok(SyncStatus::Converting),
            "completed" => Ok(SyncStatus::Completed),
            "cancelled" => Ok(SyncStatus::Cancelled),
            "error" => Ok(SyncStatus::Error),
            other => Err(format!("unknown sync status: {}", other)),
        }
    }
}

/// Kind of transfer applied to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Copy,
    Convert,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Copy => "copy",
            OperationKind::Convert => "convert",
        }
    }

    /// Status reported while an operation of this kind runs.
    pub fn status(&self) -> SyncStatus {
        match self {
            OperationKind::Copy => SyncStatus::Copying,
            OperationKind::Convert => SyncStatus::Converting,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure taxonomy shared by the executor, the UI and the retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    AccessDenied,
    MissingFile,
    InvalidFormat,
    DiskFull,
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::AccessDenied => "access_denied",
            ErrorCategory::MissingFile => "missing_file",
            ErrorCategory::InvalidFormat => "invalid_format",
            ErrorCategory::DiskFull => "disk_full",
            ErrorCategory::Other => "other",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure attached to the snapshot of the file that failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorDetails {
    pub file_path: String,
    pub operation: OperationKind,
    pub error: String,
    pub category: ErrorCategory,
    pub can_retry: bool,
}

/// Immutable progress snapshot pushed on [`SYNC_PROGRESS_CHANNEL`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub job_id: String,
    pub current_file: String,
    pub files_completed: u32,
    pub files_failed: u32,
    pub total_files: u32,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub elapsed_ms: u64,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_file_progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_details: Option<SyncErrorDetails>,
}

// ============================================================================
// Library Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// Kits whose `modified_since_sync` flag was cleared.
    KitsSynced { kit_names: Vec<String> },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::KitsSynced { .. } => "Kits marked as synced",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel. Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event, returning how many subscribers received it.
    ///
    /// Errors only when nobody is subscribed.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// New independent receiver. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// `broadcast::Receiver` with an optional predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Next event passing the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` when `n` events were overwritten before being
    /// read; `RecvError::Closed` once every sender is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`EventStream::recv`]; `None` when drained.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Next sync progress snapshot, skipping past any lag.
    ///
    /// Returns `None` once the bus is closed.
    pub async fn next_progress(&mut self) -> Option<SyncProgress> {
        loop {
            match self.recv().await {
                Ok(CoreEvent::Sync(SyncEvent::Progress(progress))) => return Some(progress),
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
