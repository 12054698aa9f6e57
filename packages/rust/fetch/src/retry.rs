//! Retry with exponential backoff.
//!
//! Only errors for which [`HarvestError::is_retryable`] holds are retried;
//! permanent failures are returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use harvest_shared::{FetchConfig, HarvestError, Result};
use tracing::{info, warn};

/// How many times, and how patiently, to retry a failing request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Growth factor applied after each retry.
    pub multiplier: f64,
    /// Cap on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(scaled)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier,
            max_delay: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
///
/// `label` names the request in log output.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retry = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if retry > 0 {
                    info!(label, attempts = retry + 1, "request succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.delay_for(retry);
                warn!(
                    label,
                    error = %e,
                    retry,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(give_up(label, e, retry)),
        }
    }
}

fn give_up(label: &str, error: HarvestError, retries: u32) -> HarvestError {
    if retries > 0 {
        warn!(label, error = %error, retries, "giving up after retries");
    }
    error
}
