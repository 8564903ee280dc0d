use std::time::Duration;

use crate::query::OperationHashes;

/// Retry budget for one kind of request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries until success or cancellation.
    pub max_attempts: Option<u32>,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    pub fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            delay,
        }
    }

    /// Whether `attempts` failures used up the budget.
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub base_url: String,
    /// Concurrent page tasks allowed per harvest.
    pub worker_limit: usize,
    pub page_size: u32,
    /// Fixed sleep after a throttled page; retried per `max_rate_limit_retries`.
    pub rate_limit_backoff: Duration,
    pub max_rate_limit_retries: Option<u32>,
    /// Video / carousel detail-page resolution.
    pub detail_retry: RetryPolicy,
    /// Transport and decode failures of the profile lookup.
    pub profile_retry: RetryPolicy,
    /// Items of one page normalized concurrently.
    pub item_concurrency: usize,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
    /// Raw `Cookie` header of an authenticated session.
    pub session_cookie: Option<String>,
    pub operation_hashes: OperationHashes,
    /// Script positions tried first when looking for embedded post data.
    pub detail_script_indices: Vec<usize>,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.instagram.com/".to_string(),
            worker_limit: 5,
            page_size: 50,
            rate_limit_backoff: Duration::from_secs(30),
            max_rate_limit_retries: None,
            detail_retry: RetryPolicy::bounded(10, Duration::from_secs(1)),
            profile_retry: RetryPolicy::bounded(10, Duration::from_secs(1)),
            item_concurrency: 4,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
            redirect_limit: 5,
            max_bytes: 16 * 1024 * 1024,
            user_agent: "Mozilla/5.0".to_string(),
            session_cookie: None,
            operation_hashes: OperationHashes::default(),
            detail_script_indices: vec![3, 4],
        }
    }
}

impl HarvestSettings {
    /// Id of the logged-in viewer, taken from the `ds_user_id` session cookie.
    pub fn viewer_id(&self) -> Option<&str> {
        self.session_cookie.as_deref().and_then(|cookie| {
            cookie.split(';').find_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                (name.trim() == "ds_user_id").then(|| value.trim())
            })
        })
    }

    pub fn has_session(&self) -> bool {
        self.session_cookie
            .as_deref()
            .is_some_and(|cookie| !cookie.trim().is_empty())
    }
}
