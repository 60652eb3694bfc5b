use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::MAX_BACKOFF_EXPONENT_LIMIT;
use crate::Error;
use crate::Result;

/// Error retry policy template
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetryConfig {
    /// Gate for automatic retry after a fetch failure
    #[serde(default = "default_should_retry_on_error")]
    pub should_retry_on_error: bool,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_error_retry_interval_ms")]
    pub error_retry_interval_ms: u64,

    /// Maximum number of retries (unset means unlimited retries)
    #[serde(default)]
    pub error_retry_count: Option<usize>,

    /// Cap of the exponential growth: delays stop doubling past 2^max_backoff_exponent
    #[serde(default = "default_max_backoff_exponent")]
    pub max_backoff_exponent: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            should_retry_on_error: default_should_retry_on_error(),
            error_retry_interval_ms: default_error_retry_interval_ms(),
            error_retry_count: None,
            max_backoff_exponent: default_max_backoff_exponent(),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.error_retry_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "error_retry_interval_ms must be greater than 0".into(),
            )));
        }
        if self.max_backoff_exponent > MAX_BACKOFF_EXPONENT_LIMIT {
            return Err(Error::Config(ConfigError::Message(format!(
                "max_backoff_exponent must be at most {MAX_BACKOFF_EXPONENT_LIMIT}, got {}",
                self.max_backoff_exponent
            ))));
        }
        Ok(())
    }

    pub fn error_retry_interval(&self) -> Duration {
        Duration::from_millis(self.error_retry_interval_ms)
    }
}

fn default_should_retry_on_error() -> bool {
    true
}
fn default_error_retry_interval_ms() -> u64 {
    5000
}
fn default_max_backoff_exponent() -> u32 {
    8
}
