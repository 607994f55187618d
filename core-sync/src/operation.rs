//! Planned file transfers and the data that flows around them.

use core_runtime::events::{ErrorCategory, OperationKind, SyncErrorDetails};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One planned transfer from the local store to the SD card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOperation {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub filename: String,
    pub kit_name: String,
    pub operation: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FileOperation {
    pub fn copy(
        kit_name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        destination_path: impl Into<PathBuf>,
    ) -> Self {
        Self::new(OperationKind::Copy, kit_name, source_path, destination_path)
    }

    pub fn convert(
        kit_name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        destination_path: impl Into<PathBuf>,
    ) -> Self {
        Self::new(OperationKind::Convert, kit_name, source_path, destination_path)
    }

    fn new(
        operation: OperationKind,
        kit_name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        destination_path: impl Into<PathBuf>,
    ) -> Self {
        let source_path = source_path.into();
        let filename = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            source_path,
            destination_path: destination_path.into(),
            filename,
            kit_name: kit_name.into(),
            operation,
            original_format: None,
            target_format: None,
            reason: None,
        }
    }

    pub fn with_formats(mut self, original: impl Into<String>, target: impl Into<String>) -> Self {
        self.original_format = Some(original.into());
        self.target_format = Some(target.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Caller-supplied operation lists for `start_kit_sync`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncData {
    #[serde(default)]
    pub files_to_convert: Vec<FileOperation>,
    #[serde(default)]
    pub files_to_copy: Vec<FileOperation>,
}

impl SyncData {
    pub fn is_empty(&self) -> bool {
        self.files_to_convert.is_empty() && self.files_to_copy.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files_to_convert.len() + self.files_to_copy.len()
    }

    /// Copies first, then conversions, each in the order given.
    pub fn into_operations(self) -> Vec<FileOperation> {
        let mut operations = self.files_to_copy;
        operations.extend(self.files_to_convert);
        operations
    }
}

/// Why a sample could not be planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    MissingFile,
    AccessDenied,
    InvalidFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub kit_name: String,
    pub file_path: PathBuf,
    pub error: String,
    pub kind: ValidationErrorKind,
}

/// Pre-sync overview shown to the user before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncChangeSummary {
    pub file_count: u32,
    pub kit_count: u32,
    pub kit_names: Vec<String>,
    pub files_to_copy: Vec<FileOperation>,
    pub files_to_convert: Vec<FileOperation>,
    pub validation_errors: Vec<ValidationError>,
    pub estimated_size_bytes: u64,
    pub has_format_warnings: bool,
}

impl SyncChangeSummary {
    pub fn is_empty(&self) -> bool {
        self.file_count == 0
    }

    /// Operation lists ready to hand to `start_kit_sync`.
    pub fn sync_data(&self) -> SyncData {
        SyncData {
            files_to_convert: self.files_to_convert.clone(),
            files_to_copy: self.files_to_copy.clone(),
        }
    }
}

/// User-facing description of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorInfo {
    pub user_message: String,
    pub can_retry: bool,
    pub category: ErrorCategory,
}

/// Outcome of executing one [`FileOperation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOperationResult {
    pub success: bool,
    pub bytes_transferred: u64,
    /// `"<filename>: <message>"` on failure.
    pub error: Option<String>,
    pub error_info: Option<SyncErrorInfo>,
}

impl FileOperationResult {
    pub fn succeeded(bytes_transferred: u64) -> Self {
        Self {
            success: true,
            bytes_transferred,
            error: None,
            error_info: None,
        }
    }

    pub fn failed(filename: &str, info: SyncErrorInfo) -> Self {
        Self {
            success: false,
            bytes_transferred: 0,
            error: Some(format!("{}: {}", filename, info.user_message)),
            error_info: Some(info),
        }
    }

    /// Progress payload for a failed operation.
    pub fn error_details(&self, op: &FileOperation) -> Option<SyncErrorDetails> {
        let info = self.error_info.as_ref()?;
        Some(SyncErrorDetails {
            file_path: op.source_path.to_string_lossy().into_owned(),
            operation: op.operation,
            error: self.error.clone().unwrap_or_else(|| info.user_message.clone()),
            category: info.category,
            can_retry: info.can_retry,
        })
    }
}

/// A file that failed during a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub kit_name: String,
    pub filename: String,
    pub source_path: PathBuf,
    pub error: String,
    pub category: ErrorCategory,
    pub can_retry: bool,
}

/// What `start_kit_sync` reports once the job has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub job_id: Option<String>,
    pub files_completed: u32,
    pub files_failed: u32,
    pub bytes_transferred: u64,
    pub failures: Vec<FailedFile>,
    pub synced_kits: Vec<String>,
    pub unsynced_kits: Vec<String>,
    pub cancelled: bool,
    /// Queue stopped early because of the error policy or a fatal failure.
    pub aborted: bool,
}

impl SyncReport {
    /// Report for a request with nothing to transfer.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.files_failed == 0 && !self.cancelled && !self.aborted
    }
}

/// Distinct kit names in first-seen order.
pub(crate) fn kit_names_of(operations: &[FileOperation]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    operations
        .iter()
        .filter(|op| seen.insert(op.kit_name.as_str()))
        .map(|op| op.kit_name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_data_puts_copies_first() {
        let data = SyncData {
            files_to_convert: vec![FileOperation::convert("A0", "/s/c1.wav", "/d/c1.wav")],
            files_to_copy: vec![
                FileOperation::copy("A0", "/s/a.wav", "/d/a.wav"),
                FileOperation::copy("A1", "/s/b.wav", "/d/b.wav"),
            ],
        };
        assert_eq!(data.len(), 3);
        let names: Vec<_> = data
            .into_operations()
            .into_iter()
            .map(|op| op.filename)
            .collect();
        assert_eq!(names, vec!["a.wav", "b.wav", "c1.wav"]);
    }

    #[test]
    fn test_file_operation_wire_format() {
        let op = FileOperation::convert("B2", "/store/pad.aif", "/sd/B2/1pad.wav")
            .with_formats("48000Hz/24bit/stereo AIFF", "44100Hz/16bit/stereo WAV");
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["kitName"], "B2");
        assert_eq!(json["operation"], "convert");
        assert_eq!(json["originalFormat"], "48000Hz/24bit/stereo AIFF");
        assert!(json.get("reason").is_none());

        let back: FileOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_failed_result_prefixes_filename() {
        let info = SyncErrorInfo {
            user_message: "Permission denied".to_string(),
            can_retry: true,
            category: ErrorCategory::AccessDenied,
        };
        let result = FileOperationResult::failed("kick.wav", info);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("kick.wav: Permission denied"));

        let op = FileOperation::copy("A0", "/s/kick.wav", "/d/1kick.wav");
        let details = result.error_details(&op).unwrap();
        assert_eq!(details.category, ErrorCategory::AccessDenied);
        assert!(details.can_retry);
    }

    #[test]
    fn test_kit_names_keep_first_seen_order() {
        let ops = vec![
            FileOperation::copy("B1", "/s/a.wav", "/d/a.wav"),
            FileOperation::copy("A0", "/s/b.wav", "/d/b.wav"),
            FileOperation::copy("B1", "/s/c.wav", "/d/c.wav"),
        ];
        assert_eq!(kit_names_of(&ops), vec!["B1", "A0"]);
    }
}
