//! # File Operation Planner
//!
//! Works out which sample files have to be written to the SD card and
//! whether each one can be copied as-is or needs converting.
//!
//! The database is the source of truth for what should exist on the card;
//! the card itself is never scanned. Only file metadata and audio headers
//! are read while planning.

use crate::categorizer::categorize_error;
use crate::operation::{
    FileOperation, SyncChangeSummary, ValidationError, ValidationErrorKind,
};
use crate::Result;
use bridge_traits::storage::FileSystemAccess;
use core_audio::{check_format, probe_file, target_description, FormatCheck};
use core_library::{KitRepository, LibraryError, Sample, SampleRepository};
use core_runtime::events::ErrorCategory;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Ordered operations plus everything the summary needs.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// Kit by kit, then voice and slot order
    pub operations: Vec<FileOperation>,
    pub validation_errors: Vec<ValidationError>,
    pub estimated_size_bytes: u64,
    pub has_format_warnings: bool,
}

impl SyncPlan {
    pub fn summary(&self) -> SyncChangeSummary {
        let mut kit_names: Vec<String> = Vec::new();
        for op in &self.operations {
            if !kit_names.contains(&op.kit_name) {
                kit_names.push(op.kit_name.clone());
            }
        }
        let (files_to_copy, files_to_convert): (Vec<_>, Vec<_>) = self
            .operations
            .iter()
            .cloned()
            .partition(|op| op.operation == core_runtime::events::OperationKind::Copy);

        SyncChangeSummary {
            file_count: u32::try_from(self.operations.len()).unwrap_or(u32::MAX),
            kit_count: u32::try_from(kit_names.len()).unwrap_or(u32::MAX),
            kit_names,
            files_to_copy,
            files_to_convert,
            validation_errors: self.validation_errors.clone(),
            estimated_size_bytes: self.estimated_size_bytes,
            has_format_warnings: self.has_format_warnings,
        }
    }
}

pub struct FileOperationPlanner {
    kits: Arc<dyn KitRepository>,
    samples: Arc<dyn SampleRepository>,
    file_system: Arc<dyn FileSystemAccess>,
}

impl FileOperationPlanner {
    pub fn new(
        kits: Arc<dyn KitRepository>,
        samples: Arc<dyn SampleRepository>,
        file_system: Arc<dyn FileSystemAccess>,
    ) -> Self {
        Self {
            kits,
            samples,
            file_system,
        }
    }

    /// Plan `kit_names`, or every kit modified since the last sync when the
    /// list is empty.
    ///
    /// # Errors
    ///
    /// Fails on database errors or an unknown kit name. Unreadable sample
    /// files are reported in [`SyncPlan::validation_errors`] instead.
    #[instrument(skip(self, local_store, sd_root), fields(kits = kit_names.len()))]
    pub async fn plan(
        &self,
        kit_names: &[String],
        local_store: &Path,
        sd_root: &Path,
        force_mono: bool,
    ) -> Result<SyncPlan> {
        let kits = self.resolve_kits(kit_names).await?;
        let mut plan = SyncPlan::default();

        for kit in &kits {
            let samples = self.samples.find_by_kit(kit).await?;
            debug!(kit = %kit, samples = samples.len(), "Planning kit");
            for sample in &samples {
                self.plan_sample(&mut plan, sample, local_store, sd_root, force_mono)
                    .await;
            }
        }

        info!(
            operations = plan.operations.len(),
            validation_errors = plan.validation_errors.len(),
            bytes = plan.estimated_size_bytes,
            "Sync plan ready"
        );
        Ok(plan)
    }

    async fn resolve_kits(&self, kit_names: &[String]) -> Result<Vec<String>> {
        if kit_names.is_empty() {
            let modified = self.kits.find_modified().await?;
            return Ok(modified.into_iter().map(|k| k.name).collect());
        }

        let mut seen = BTreeSet::new();
        let mut resolved = Vec::new();
        for name in kit_names {
            if !seen.insert(name.as_str()) {
                continue;
            }
            if self.kits.find_by_name(name).await?.is_none() {
                return Err(LibraryError::NotFound {
                    entity_type: "Kit".to_string(),
                    id: name.clone(),
                }
                .into());
            }
            resolved.push(name.clone());
        }
        Ok(resolved)
    }

    async fn plan_sample(
        &self,
        plan: &mut SyncPlan,
        sample: &Sample,
        local_store: &Path,
        sd_root: &Path,
        force_mono: bool,
    ) {
        let source = resolve_source(local_store, &sample.source_path);

        let size = match self.file_system.metadata(&source).await {
            Ok(meta) if meta.is_directory => {
                plan.validation_errors.push(ValidationError {
                    kit_name: sample.kit_name.clone(),
                    file_path: source,
                    error: "Sample path is a directory".to_string(),
                    kind: ValidationErrorKind::InvalidFormat,
                });
                return;
            }
            Ok(meta) => meta.size,
            Err(e) => {
                let info = categorize_error(&e, Some(&source));
                warn!(kit = %sample.kit_name, file = %sample.filename, category = %info.category, "Sample cannot be synced");
                plan.validation_errors.push(ValidationError {
                    kit_name: sample.kit_name.clone(),
                    file_path: source,
                    error: info.user_message,
                    kind: validation_kind(info.category),
                });
                return;
            }
        };

        let destination = destination_path(
            sd_root,
            &sample.kit_name,
            sample.voice_number,
            &sample.filename,
        );

        let op = match probe_file(&source).await {
            Ok(props) => match check_format(&props, force_mono) {
                FormatCheck::Compatible => {
                    FileOperation::copy(&sample.kit_name, &source, destination)
                }
                check @ FormatCheck::NeedsConversion { .. } => {
                    let mut op = FileOperation::convert(&sample.kit_name, &source, destination)
                        .with_formats(props.describe(), target_description(Some(&props), force_mono));
                    if let Some(reason) = check.reason() {
                        op = op.with_reason(reason);
                    }
                    op
                }
            },
            Err(e) => {
                debug!(file = %sample.filename, error = %e, "Format unknown, planning conversion");
                plan.has_format_warnings = true;
                FileOperation::convert(&sample.kit_name, &source, destination)
                    .with_formats("unknown", target_description(None, force_mono))
                    .with_reason(format!("format could not be read: {e}"))
            }
        };

        plan.estimated_size_bytes = plan.estimated_size_bytes.saturating_add(size);
        plan.operations.push(op);
    }
}

fn validation_kind(category: ErrorCategory) -> ValidationErrorKind {
    match category {
        ErrorCategory::AccessDenied => ValidationErrorKind::AccessDenied,
        ErrorCategory::InvalidFormat => ValidationErrorKind::InvalidFormat,
        _ => ValidationErrorKind::MissingFile,
    }
}

/// Relative sample paths live under the local store.
pub fn resolve_source(local_store: &Path, source_path: &str) -> PathBuf {
    let path = Path::new(source_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        local_store.join(path)
    }
}

/// `<sd_root>/<kit>/<voice><stem>.wav`.
///
/// The Rample assigns a file to a voice by its leading digit; a stem that
/// already starts with the voice number keeps its name.
pub fn destination_path(sd_root: &Path, kit_name: &str, voice_number: i64, filename: &str) -> PathBuf {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let prefix = voice_number.to_string();
    let name = if stem.starts_with(&prefix) {
        format!("{stem}.wav")
    } else {
        format!("{prefix}{stem}.wav")
    };
    sd_root.join(kit_name).join(name)
}
