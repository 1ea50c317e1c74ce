use std::collections::HashSet;
use std::time::Duration;

use reqwest::Url;

/// Retry behaviour for a [`Transport`](crate::Transport).
///
/// `max_attempts` bounds the total number of retries across every retry cause
/// combined: network errors, retryable statuses and the single 401-triggered
/// auth refresh all draw from the same budget.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Upper bound on retries per logical request.
    pub max_attempts: u32,
    /// Base delay for full-jitter exponential backoff.
    pub base_backoff: Duration,
    /// Statuses that trigger a retry when the request is retry-eligible.
    pub retry_on_status: HashSet<u16>,
    /// Ceiling on any single computed backoff sleep.
    pub max_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            retry_on_status: HashSet::from([429, 500, 502, 503, 504]),
            max_cap: Duration::from_secs(10),
        }
    }
}

/// Immutable configuration for a [`Transport`](crate::Transport).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL joined with the per-call path.
    pub base_url: Url,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Bound on a whole send, from connect to the end of the body. Each
    /// attempt gets the full budget; there is no cross-attempt deadline.
    pub total_timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl TransportConfig {
    /// Configuration with default timeouts and retry policy.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            total_timeout: Duration::from_secs(40),
            user_agent: concat!("gavaconnect-rs/", env!("CARGO_PKG_VERSION")).to_owned(),
            retry: RetryPolicy::default(),
        }
    }
}
