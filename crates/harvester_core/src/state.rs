use std::collections::BTreeSet;
use std::time::Duration;

use crate::{CollectionResult, ErrorLog, HarvestStatus, PagePlan, RecordSet};

pub type PageId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HarvestPhase {
    #[default]
    Planning,
    /// At least one page task is fetching or normalizing.
    Fetching,
    /// The root call is waiting for the remaining page tasks.
    Draining,
    Done,
}

/// Shared mutable state of one harvest.
///
/// Every mutation goes through [`crate::update`]; callers that run page tasks
/// concurrently must serialize those calls (the engine holds one mutex).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HarvestState {
    pub(crate) phase: HarvestPhase,
    pub(crate) plan: PagePlan,
    pub(crate) remaining: u32,
    pub(crate) next_page: PageId,
    /// Pages allocated and not yet finished.
    pub(crate) live: BTreeSet<PageId>,
    pub(crate) pages_fetched: usize,
    pub(crate) status: HarvestStatus,
    pub(crate) records: RecordSet,
    pub(crate) errors: ErrorLog,
}

impl HarvestState {
    pub fn new(plan: PagePlan) -> Self {
        Self {
            plan,
            remaining: plan.request_count,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> HarvestPhase {
        self.phase
    }

    pub fn plan(&self) -> PagePlan {
        self.plan
    }

    /// Requests still allowed in the chain, counting the one in progress.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn in_flight(&self) -> usize {
        self.live.len()
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn status(&self) -> HarvestStatus {
        self.status
    }

    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn is_done(&self) -> bool {
        self.phase == HarvestPhase::Done
    }

    pub(crate) fn allocate_page(&mut self) -> PageId {
        self.next_page += 1;
        self.live.insert(self.next_page);
        self.next_page
    }

    /// Marks `page` finished; false when it was never allocated or already finished.
    pub(crate) fn finish_page(&mut self, page: PageId) -> bool {
        self.live.remove(&page)
    }

    /// Stops the chain: no continuation will be spawned after this.
    pub(crate) fn close_chain(&mut self) {
        self.remaining = 0;
    }

    pub(crate) fn set_terminal(&mut self, status: HarvestStatus) {
        if self.status == HarvestStatus::Complete {
            self.status = status;
        }
    }

    pub fn into_result(self, elapsed: Duration) -> CollectionResult {
        CollectionResult {
            status: self.status,
            errors: self.errors.into_entries(),
            records: self.records.into_vec(),
            elapsed,
        }
    }
}
