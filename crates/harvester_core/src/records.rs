use std::collections::HashSet;

use crate::CanonicalRecord;

/// Accumulated records of one harvest, deduplicated by structural equality.
///
/// Arrival order is kept only for stable output; it carries no meaning since
/// pages complete in whatever order their requests resolve.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordSet {
    seen: HashSet<CanonicalRecord>,
    ordered: Vec<CanonicalRecord>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record` unless an identical one is already present.
    pub fn insert(&mut self, record: CanonicalRecord) -> bool {
        if self.seen.contains(&record) {
            return false;
        }
        self.seen.insert(record.clone());
        self.ordered.push(record);
        true
    }

    pub fn contains(&self, record: &CanonicalRecord) -> bool {
        self.seen.contains(record)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalRecord> {
        self.ordered.iter()
    }

    pub fn into_vec(self) -> Vec<CanonicalRecord> {
        self.ordered
    }
}
