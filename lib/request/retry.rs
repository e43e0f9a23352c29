use log::debug;
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::api_client::ApiResponse;

/// Retry behavior for non-2xx responses. Owned by the import run, not the http
/// client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first attempt. `1` disables retries.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound of the per-record offset added to every backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 1
    }

    /// Wait before attempt `attempt + 1`: `initial_backoff * 2^(attempt - 1)`
    /// capped at `max_backoff`, plus a jitter fixed by `(jitter_key, attempt)`.
    pub fn backoff(&self, attempt: u32, jitter_key: u64) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        let base = self
            .initial_backoff
            .checked_mul(1 << doublings)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff);
        base + self.jitter_for(attempt, jitter_key)
    }

    fn jitter_for(&self, attempt: u32, jitter_key: u64) -> Duration {
        let cap_ms = self.jitter.as_millis() as u64;
        if cap_ms == 0 {
            return Duration::ZERO;
        }
        let mut hasher = DefaultHasher::new();
        (jitter_key, attempt).hash(&mut hasher);
        Duration::from_millis(hasher.finish() % (cap_ms + 1))
    }
}

/// Statuses worth asking again for: timeouts, rate limiting and server errors.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

/// Calls the api until it answers with a status that isn't retryable or the
/// policy runs out of attempts, and returns the last response either way.
///
/// Transport errors end the loop immediately. `jitter_key` should differ per
/// record so requests scheduled together don't retry in lockstep.
pub async fn send_with_retry<F, Fut, E>(
    policy: &RetryPolicy,
    jitter_key: u64,
    mut call: F,
) -> Result<ApiResponse, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<ApiResponse, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let response = call(attempt).await?;
        if !is_retryable_status(response.status) {
            return Ok(response);
        }
        if attempt >= max_attempts {
            if policy.is_enabled() {
                debug!(
                    "Giving up on {} after {} attempts with status {}",
                    response.url, attempt, response.status
                );
            }
            return Ok(response);
        }

        let delay = policy.backoff(attempt, jitter_key);
        debug!(
            "{} answered {}, retrying in {:?}",
            response.url, response.status, delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
