use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use rand::Rng;

use crate::constants::MAX_BACKOFF_EXPONENT_LIMIT;
use crate::RetryConfig;

/// Decides whether and when a failed fetch is retried.
///
/// `retry_count` is the number of the retry about to be scheduled (1 for the first retry
/// after the initial failure). Returning `None` drops the retry silently.
#[cfg_attr(test, automock)]
pub trait RetryPolicy: Send + Sync {
    fn next_delay(
        &self,
        retry_count: usize,
        config: &RetryConfig,
    ) -> Option<Duration>;
}

/// Exponential backoff with ±50% jitter, capped at `2^max_backoff_exponent` times the
/// base interval. Unlimited unless `error_retry_count` is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExponentialBackoff;

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(
        &self,
        retry_count: usize,
        config: &RetryConfig,
    ) -> Option<Duration> {
        if let Some(max) = config.error_retry_count {
            if retry_count > max {
                return None;
            }
        }
        let jitter: f64 = rand::thread_rng().gen();
        Some(backoff_delay(retry_count, jitter, config))
    }
}

/// `floor((jitter + 0.5) * 2^min(retry_count, cap)) * interval` for `jitter` in `[0, 1)`.
///
/// The cap itself is clamped to 31, so configs that skipped validation cannot overflow.
pub fn backoff_delay(
    retry_count: usize,
    jitter: f64,
    config: &RetryConfig,
) -> Duration {
    let cap = config.max_backoff_exponent.min(MAX_BACKOFF_EXPONENT_LIMIT);
    let exponent = retry_count.min(cap as usize) as u32;
    let multiplier = ((jitter + 0.5) * (1u64 << exponent) as f64).floor() as u64;
    Duration::from_millis(config.error_retry_interval_ms.saturating_mul(multiplier))
}
