use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Failure taxonomy recorded in a harvest's error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    Malformed,
    Transport,
    PrivateOrInaccessible,
    NotFound,
    Cancelled,
    RetriesExhausted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::Malformed => "MALFORMED",
            ErrorKind::Transport => "TRANSPORT",
            ErrorKind::PrivateOrInaccessible => "PRIVATE_USER",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::RetriesExhausted => "MAX_RETRIES",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEntry {
    pub fn new(kind: ErrorKind, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp,
        }
    }
}

/// Append-only error log; entries with an already-seen message are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorLog {
    entries: Vec<ErrorEntry>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry`, returning false if its message was already logged.
    pub fn record(&mut self, entry: ErrorEntry) -> bool {
        if self.entries.iter().any(|e| e.message == entry.message) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<ErrorEntry> {
        self.entries
    }
}
