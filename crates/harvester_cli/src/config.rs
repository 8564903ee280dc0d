use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use harvester_engine::{HarvestSettings, RetryPolicy};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "harvester.ron";

/// Optional on-disk configuration. Every field may be omitted; command line
/// flags win over the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CliConfig {
    pub output_dir: Option<PathBuf>,
    pub session_cookie: Option<String>,
    pub base_url: Option<String>,
    pub worker_limit: Option<usize>,
    pub page_size: Option<u32>,
    pub item_concurrency: Option<usize>,
    pub rate_limit_backoff_secs: Option<u64>,
    pub max_rate_limit_retries: Option<u32>,
    /// Zero means retry detail pages until cancelled.
    pub detail_retry_attempts: Option<u32>,
    pub profile_retry_attempts: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub log_to_file: bool,
}

impl CliConfig {
    /// Load `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()))
            }
        };
        ron::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("harvest"))
    }

    pub fn to_settings(&self) -> HarvestSettings {
        let mut settings = HarvestSettings::default();
        if let Some(url) = &self.base_url {
            settings.base_url = url.clone();
        }
        settings.session_cookie = self.session_cookie.clone();
        if let Some(limit) = self.worker_limit {
            settings.worker_limit = limit;
        }
        if let Some(size) = self.page_size {
            settings.page_size = size;
        }
        if let Some(concurrency) = self.item_concurrency {
            settings.item_concurrency = concurrency;
        }
        if let Some(secs) = self.rate_limit_backoff_secs {
            settings.rate_limit_backoff = Duration::from_secs(secs);
        }
        settings.max_rate_limit_retries = self.max_rate_limit_retries;
        if let Some(attempts) = self.detail_retry_attempts {
            let delay = settings.detail_retry.delay;
            settings.detail_retry = match attempts {
                0 => RetryPolicy::unbounded(delay),
                n => RetryPolicy::bounded(n, delay),
            };
        }
        if let Some(attempts) = self.profile_retry_attempts {
            settings.profile_retry.max_attempts = Some(attempts.max(1));
        }
        if let Some(secs) = self.request_timeout_secs {
            settings.request_timeout = Duration::from_secs(secs);
        }
        settings
    }
}
