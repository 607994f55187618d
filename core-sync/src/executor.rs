//! # Sync Executor
//!
//! Performs a single [`FileOperation`]: a byte-for-byte copy or a call into
//! the [`FormatConverter`]. Failures are categorized and returned in the
//! [`FileOperationResult`]; nothing is propagated past this boundary.

use crate::categorizer::categorize_error;
use crate::operation::{FileOperation, FileOperationResult};
use crate::{Result, SyncError};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::BridgeError;
use core_audio::{AudioError, ConversionOptions, FormatConverter};
use core_runtime::events::OperationKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct SyncExecutor {
    file_system: Arc<dyn FileSystemAccess>,
    converter: Arc<dyn FormatConverter>,
}

impl SyncExecutor {
    pub fn new(file_system: Arc<dyn FileSystemAccess>, converter: Arc<dyn FormatConverter>) -> Self {
        Self {
            file_system,
            converter,
        }
    }

    /// Run one operation. Writes at most one file.
    #[instrument(skip_all, fields(file = %op.filename, kit = %op.kit_name, operation = %op.operation))]
    pub async fn execute_file_operation(
        &self,
        op: &FileOperation,
        force_mono: bool,
    ) -> FileOperationResult {
        match self.run(op, force_mono).await {
            Ok(bytes) => {
                debug!(bytes, "File written");
                FileOperationResult::succeeded(bytes)
            }
            Err(e) => {
                let info = categorize_error(&e, failed_path(&e));
                warn!(category = %info.category, error = %e, "File operation failed");
                FileOperationResult::failed(&op.filename, info)
            }
        }
    }

    async fn run(&self, op: &FileOperation, force_mono: bool) -> Result<u64> {
        let source = self.file_system.metadata(&op.source_path).await?;
        if source.is_directory {
            return Err(BridgeError::OperationFailed(format!(
                "{} is a directory",
                op.source_path.display()
            ))
            .into());
        }

        if let Some(parent) = op.destination_path.parent() {
            self.file_system.create_dir_all(parent).await?;
        }

        match op.operation {
            OperationKind::Copy => {
                let copied = self
                    .file_system
                    .copy_file(&op.source_path, &op.destination_path)
                    .await?;
                Ok(copied)
            }
            OperationKind::Convert => {
                let options = ConversionOptions { force_mono };
                self.converter
                    .convert(&op.source_path, &op.destination_path, options)
                    .await?;
                let written = self.file_system.metadata(&op.destination_path).await?;
                Ok(written.size)
            }
        }
    }

    /// Sum of source sizes; files that cannot be read count as zero.
    pub async fn calculate_total_size(&self, operations: &[FileOperation]) -> u64 {
        let mut total = 0u64;
        for op in operations {
            total = total.saturating_add(self.file_system.file_size(&op.source_path).await.unwrap_or(0));
        }
        total
    }

    /// Fail unless the SD card root exists and is a directory.
    pub async fn check_destination_root(&self, root: &Path) -> Result<()> {
        let unavailable = |message: String| SyncError::DestinationUnavailable {
            path: root.to_path_buf(),
            message,
        };
        match self.file_system.metadata(root).await {
            Ok(meta) if meta.is_directory => Ok(()),
            Ok(_) => Err(unavailable("not a directory".to_string())),
            Err(e) => Err(unavailable(e.to_string())),
        }
    }
}

/// Path the failing step touched, when the error names one.
fn failed_path(err: &SyncError) -> Option<&Path> {
    match err {
        SyncError::Bridge(BridgeError::PathNotAccessible { path, .. }) => Some(path),
        SyncError::Audio(AudioError::ProbeFailed { path, .. }) => Some(path),
        _ => None,
    }
}
