use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use engine_logging::engine_info;
use harvester_core::{CanonicalRecord, CollectionResult, ErrorEntry, HarvestStatus};
use serde::Serialize;

use crate::filename::deterministic_filename;
use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub record_count: usize,
    pub error_count: usize,
}

#[derive(Serialize)]
struct CollectionExport<'a> {
    label: &'a str,
    resource: &'a str,
    exported_utc: DateTime<Utc>,
    status: HarvestStatus,
    count: usize,
    elapsed_ms: u64,
    errors: &'a [ErrorEntry],
    records: &'a [CanonicalRecord],
}

/// Write one harvest result as pretty JSON to `{dir}/{label}--{hash}.json`.
pub fn export_collection(
    dir: &Path,
    label: &str,
    resource: &str,
    result: &CollectionResult,
) -> Result<ExportSummary, ExportError> {
    let export = CollectionExport {
        label,
        resource,
        exported_utc: Utc::now(),
        status: result.status,
        count: result.records.len(),
        elapsed_ms: u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
        errors: &result.errors,
        records: &result.records,
    };
    let body = serde_json::to_vec_pretty(&export)?;
    let path = AtomicFileWriter::new(dir).write(&deterministic_filename(label, resource), &body)?;
    engine_info!("exported {} records to {}", export.count, path.display());
    Ok(ExportSummary {
        path,
        record_count: result.records.len(),
        error_count: result.errors.len(),
    })
}

/// Write any serializable document (profile, story, feed) next to the harvests.
pub fn export_document<T: Serialize>(
    dir: &Path,
    label: &str,
    resource: &str,
    document: &T,
) -> Result<PathBuf, ExportError> {
    let body = serde_json::to_vec_pretty(document)?;
    let path = AtomicFileWriter::new(dir).write(&deterministic_filename(label, resource), &body)?;
    engine_info!("exported {} to {}", label, path.display());
    Ok(path)
}
