//! Retry with exponential backoff for transient platform errors

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::PlatformError;

/// How many times to try a platform call and how long to wait in between
///
/// The delay doubles after each failed attempt: with the defaults the
/// waits are 1s, 2s, 4s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Wait before the attempt following `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(2_u32.pow(exponent))
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
///
/// Only errors for which [`PlatformError::is_transient`] holds are retried.
/// The last error is returned unchanged.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    platform: &str,
    mut operation: F,
) -> Result<T, PlatformError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlatformError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("Successfully posted to {} on attempt {}", platform, attempt);
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "Transient error posting to {} (attempt {}/{}): {}. Retrying in {}...",
                    platform,
                    attempt,
                    max_attempts,
                    e,
                    humantime::format_duration(delay)
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt == max_attempts && e.is_transient() {
                    warn!(
                        "Failed to post to {} after {} attempts: {}",
                        platform, max_attempts, e
                    );
                }
                return Err(e);
            }
        }
    }
}
