use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Parameters governing how fetches are started, shared and signalled
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RevalidationConfig {
    /// How long a settled fetch stays joinable by deduplicating callers (milliseconds)
    #[serde(default = "default_deduping_interval_ms")]
    pub deduping_interval_ms: u64,

    /// Delay before a first load is reported as slow (milliseconds, 0 disables)
    #[serde(default = "default_loading_timeout_ms")]
    pub loading_timeout_ms: u64,

    /// Minimum spacing between two focus-triggered revalidations of one observer
    #[serde(default = "default_focus_throttle_interval_ms")]
    pub focus_throttle_interval_ms: u64,

    #[serde(default = "default_true")]
    pub revalidate_on_focus: bool,

    #[serde(default = "default_true")]
    pub revalidate_on_reconnect: bool,
}

impl Default for RevalidationConfig {
    fn default() -> Self {
        Self {
            deduping_interval_ms: default_deduping_interval_ms(),
            loading_timeout_ms: default_loading_timeout_ms(),
            focus_throttle_interval_ms: default_focus_throttle_interval_ms(),
            revalidate_on_focus: true,
            revalidate_on_reconnect: true,
        }
    }
}

impl RevalidationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.deduping_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "deduping_interval_ms must be greater than 0".into(),
            )));
        }
        if self.focus_throttle_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "focus_throttle_interval_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn deduping_interval(&self) -> Duration {
        Duration::from_millis(self.deduping_interval_ms)
    }

    /// `None` when the slow-loading signal is disabled
    pub fn loading_timeout(&self) -> Option<Duration> {
        (self.loading_timeout_ms > 0).then(|| Duration::from_millis(self.loading_timeout_ms))
    }

    pub fn focus_throttle_interval(&self) -> Duration {
        Duration::from_millis(self.focus_throttle_interval_ms)
    }
}

fn default_deduping_interval_ms() -> u64 {
    2000
}
fn default_loading_timeout_ms() -> u64 {
    3000
}
fn default_focus_throttle_interval_ms() -> u64 {
    5000
}
fn default_true() -> bool {
    true
}
