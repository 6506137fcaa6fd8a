use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upstream endpoint used when none is configured.
pub const DEFAULT_PRIMARY_URL: &str = "http://tennis-bot:8000/api/tennis";

/// # Pipeline Configuration
///
/// Every option of the poll loop, snapshot cache and dispatcher. Missing
/// fields take their defaults, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Upstream feed polled every cycle.
    pub primary_url: String,
    /// Alternates tried in order when the primary fails during bootstrap.
    pub fallback_urls: Vec<String>,
    /// Lifetime of a cached match snapshot after its last update.
    pub cache_ttl_secs: u64,
    /// Target length of a successful poll cycle, fetch time included.
    pub cycle_target_secs: u64,
    /// Interval after which unchanged content is re-sent to a subscriber.
    pub heartbeat_secs: u64,
    /// Pause after a failed cycle.
    pub failure_backoff_secs: u64,
    /// Upper bound on a single upstream request.
    pub fetch_timeout_secs: u64,
    /// Transient-error retries within one fetch.
    pub fetch_max_retries: u32,
    /// Whether an empty match list replaces the live set (otherwise it is a failed fetch).
    pub accept_empty_feed: bool,
    /// Undelivered frames a subscriber may have queued before it is dropped.
    pub subscriber_queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            primary_url: DEFAULT_PRIMARY_URL.to_string(),
            fallback_urls: Vec::new(),
            cache_ttl_secs: 3600,
            cycle_target_secs: 10,
            heartbeat_secs: 5,
            failure_backoff_secs: 10,
            fetch_timeout_secs: 8,
            fetch_max_retries: 0,
            accept_empty_feed: false,
            subscriber_queue_capacity: 16,
        }
    }
}

impl PipelineConfig {
    /// Primary URL followed by the fallbacks, in the order bootstrap tries them.
    pub fn source_urls(&self) -> Vec<String> {
        std::iter::once(self.primary_url.clone())
            .chain(self.fallback_urls.iter().cloned())
            .collect()
    }

    /// `cache_ttl_secs` as a `Duration`.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// `cycle_target_secs` as a `Duration`.
    pub fn cycle_target(&self) -> Duration {
        Duration::from_secs(self.cycle_target_secs)
    }

    /// `heartbeat_secs` as a `Duration`.
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    /// `failure_backoff_secs` as a `Duration`.
    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }

    /// `fetch_timeout_secs` as a `Duration`; the bound on a single request.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
