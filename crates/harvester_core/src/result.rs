use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CanonicalRecord, ErrorEntry};

/// How a harvest ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvestStatus {
    /// The chain drained; errors, if any, are in the log.
    #[default]
    Complete,
    /// The target resource does not exist. Distinct from an empty success.
    NotFound,
    /// The target is not visible to the current session.
    Inaccessible,
    /// The caller cancelled the harvest before it drained.
    Cancelled,
}

/// Terminal, immutable output of one harvest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResult {
    pub status: HarvestStatus,
    pub errors: Vec<ErrorEntry>,
    pub records: Vec<CanonicalRecord>,
    pub elapsed: Duration,
}

impl CollectionResult {
    /// A result produced without any network work, e.g. for a private profile.
    pub fn early(status: HarvestStatus, errors: Vec<ErrorEntry>) -> Self {
        Self {
            status,
            errors,
            records: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_complete(&self) -> bool {
        self.status == HarvestStatus::Complete
    }
}
