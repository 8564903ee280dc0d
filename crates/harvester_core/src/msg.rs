use chrono::{DateTime, Utc};

use crate::{CanonicalRecord, ErrorKind, PageId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Root call: begin the chain at `cursor`.
    Start { cursor: String },
    /// A page envelope was decoded.
    PageFetched {
        page: PageId,
        next_cursor: Option<String>,
        has_more: bool,
        item_count: usize,
    },
    /// Items of a page were normalized into records.
    RecordsNormalized {
        page: PageId,
        records: Vec<CanonicalRecord>,
    },
    /// A non-fatal error worth keeping in the log (rate limit, bad item).
    ErrorRaised {
        kind: ErrorKind,
        message: String,
        at: DateTime<Utc>,
    },
    /// A page could not be fetched; its lineage is abandoned.
    PageFailed {
        page: PageId,
        kind: ErrorKind,
        message: String,
        at: DateTime<Utc>,
    },
    /// A page task exited, successfully or not.
    PageFinished { page: PageId },
    /// The root call is now waiting for outstanding page tasks.
    DrainRequested,
    /// The caller cancelled the harvest.
    CancelRequested { at: DateTime<Utc> },
}
