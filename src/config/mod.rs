//! Configuration management for the cache engine.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//!
//! The effective configuration of an observer is merged with precedence
//! call-site ([`ConfigOverrides`]) > ambient (the owning cache's config) > defaults.

mod retry;
mod revalidation;

use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
pub use retry::*;
pub use revalidation::*;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;


const ENV_PREFIX: &str = "SWR";

/// Main configuration container for the cache engine
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables with `SWR__` prefix (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct CacheConfig {
    /// Deduplication, loading and trigger parameters
    #[serde(default)]
    pub revalidation: RevalidationConfig,

    /// Automatic retry after fetch failure
    #[serde(default)]
    pub retry: RetryConfig,
}

impl CacheConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// # Note
    /// Validation is deferred so that further overrides can be applied via
    /// `with_override_config()`. Callers should call `validate()` last.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("SWR__REVALIDATION__DEDUPING_INTERVAL_MS", "500");
    /// let cfg = CacheConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance
    pub fn validate(self) -> Result<Self> {
        self.revalidation.validate()?;
        self.retry.validate()?;
        Ok(self)
    }

    /// Layer call-site overrides on top of this configuration
    pub fn merge(
        &self,
        overrides: &ConfigOverrides,
    ) -> Self {
        let mut merged = self.clone();
        let r = &mut merged.revalidation;
        if let Some(v) = overrides.deduping_interval_ms {
            r.deduping_interval_ms = v;
        }
        if let Some(v) = overrides.loading_timeout_ms {
            r.loading_timeout_ms = v;
        }
        if let Some(v) = overrides.focus_throttle_interval_ms {
            r.focus_throttle_interval_ms = v;
        }
        if let Some(v) = overrides.revalidate_on_focus {
            r.revalidate_on_focus = v;
        }
        if let Some(v) = overrides.revalidate_on_reconnect {
            r.revalidate_on_reconnect = v;
        }

        let retry = &mut merged.retry;
        if let Some(v) = overrides.should_retry_on_error {
            retry.should_retry_on_error = v;
        }
        if let Some(v) = overrides.error_retry_interval_ms {
            retry.error_retry_interval_ms = v;
        }
        if let Some(v) = overrides.error_retry_count {
            retry.error_retry_count = Some(v);
        }
        merged
    }
}

/// Call-site configuration; unset fields fall back to the ambient configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub deduping_interval_ms: Option<u64>,
    pub loading_timeout_ms: Option<u64>,
    pub focus_throttle_interval_ms: Option<u64>,
    pub revalidate_on_focus: Option<bool>,
    pub revalidate_on_reconnect: Option<bool>,
    pub should_retry_on_error: Option<bool>,
    pub error_retry_interval_ms: Option<u64>,
    pub error_retry_count: Option<usize>,
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
