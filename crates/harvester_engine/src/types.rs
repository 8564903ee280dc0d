use std::fmt;
use std::time::Duration;

use harvester_core::{ErrorKind, PageId};

/// Which paginated collection a harvest walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Media,
    Following,
    Followers,
    Explore,
    Hashtag,
}

impl CollectionKind {
    pub fn label(self) -> &'static str {
        match self {
            CollectionKind::Media => "media",
            CollectionKind::Following => "following",
            CollectionKind::Followers => "follower",
            CollectionKind::Explore => "explore",
            CollectionKind::Hashtag => "hashtag",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Input to one harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestTarget {
    pub resource_id: String,
    /// Number of items wanted; zero means "all" and is resolved by the caller.
    pub total_wanted: u32,
    pub page_size: u32,
    /// Empty string starts at the head of the collection.
    pub start_cursor: String,
}

/// Cursor the explore feed starts from when none is given.
pub const EXPLORE_START_CURSOR: &str = "1";
/// Explore page size the web client asks for.
pub const EXPLORE_PAGE_SIZE: u32 = 14;

/// Caller-facing knobs of a collection harvest; the resource comes from the profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestRequest {
    pub total_wanted: u32,
    pub page_size: u32,
    pub start_cursor: String,
}

impl Default for HarvestRequest {
    fn default() -> Self {
        Self {
            total_wanted: 0,
            page_size: 50,
            start_cursor: String::new(),
        }
    }
}

impl HarvestRequest {
    /// One explore page of [`EXPLORE_PAGE_SIZE`] from [`EXPLORE_START_CURSOR`].
    pub fn explore() -> Self {
        Self {
            total_wanted: 0,
            page_size: EXPLORE_PAGE_SIZE,
            start_cursor: EXPLORE_START_CURSOR.to_string(),
        }
    }

    pub fn for_resource(&self, resource_id: impl Into<String>, total_wanted: u32) -> HarvestTarget {
        HarvestTarget {
            resource_id: resource_id.into(),
            total_wanted,
            page_size: self.page_size,
            start_cursor: self.start_cursor.clone(),
        }
    }
}

/// Decoded page payload. Consumed immediately by the normalizer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawPage {
    pub items: Vec<serde_json::Value>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Malformed, message)
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "harvest cancelled")
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind == FailureKind::RateLimited
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Service throttled us, or the page data was structurally absent.
    RateLimited,
    Malformed,
    Transport,
    Timeout,
    HttpStatus(u16),
    TooLarge { max_bytes: u64, actual: Option<u64> },
    InvalidUrl,
    NotFound,
    PrivateOrInaccessible,
    Cancelled,
    RetriesExhausted { attempts: u32 },
}

impl FailureKind {
    /// Kind recorded in the harvest error log.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            FailureKind::RateLimited => ErrorKind::RateLimited,
            FailureKind::Malformed | FailureKind::InvalidUrl => ErrorKind::Malformed,
            FailureKind::Transport
            | FailureKind::Timeout
            | FailureKind::HttpStatus(_)
            | FailureKind::TooLarge { .. } => ErrorKind::Transport,
            FailureKind::NotFound => ErrorKind::NotFound,
            FailureKind::PrivateOrInaccessible => ErrorKind::PrivateOrInaccessible,
            FailureKind::Cancelled => ErrorKind::Cancelled,
            FailureKind::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::RateLimited => write!(f, "rate limited"),
            FailureKind::Malformed => write!(f, "malformed response"),
            FailureKind::Transport => write!(f, "network error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::NotFound => write!(f, "not found"),
            FailureKind::PrivateOrInaccessible => write!(f, "private or inaccessible"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::RetriesExhausted { attempts } => {
                write!(f, "gave up after {attempts} attempts")
            }
        }
    }
}

/// Progress notifications emitted while a harvest runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    PageFetched {
        collection: CollectionKind,
        page: PageId,
        items: usize,
        has_more: bool,
    },
    Backoff {
        collection: CollectionKind,
        page: PageId,
        attempt: u32,
        delay: Duration,
    },
    RecordsAdded {
        collection: CollectionKind,
        total: usize,
    },
    PageFailed {
        collection: CollectionKind,
        page: PageId,
        kind: FailureKind,
    },
    Drained {
        collection: CollectionKind,
        records: usize,
        errors: usize,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: HarvestEvent) {}
}
