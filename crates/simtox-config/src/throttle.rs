//! Rate limiting, caching, and deadline settings for provider calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default sustained request rate per provider (public free-tier friendly).
const fn default_per_second() -> f64 {
    5.0
}

/// Default burst size per provider.
const fn default_burst() -> u32 {
    10
}

/// Default cache entry lifetime: one hour.
const fn default_cache_ttl_secs() -> u64 {
    3600
}

/// Default maximum number of cached responses.
const fn default_cache_capacity() -> usize {
    1024
}

/// Default bound on waiting for a rate-limit token.
const fn default_max_wait_secs() -> u64 {
    30
}

/// Default deadline for a single upstream call.
const fn default_upstream_timeout_secs() -> u64 {
    10
}

/// Accepted range for a bucket's refill rate, in requests per second.
const PER_SECOND_RANGE: std::ops::RangeInclusive<f64> = 0.001..=10_000.0;

/// Upper bound for `max_wait_secs` and `upstream_timeout_secs`: one day.
const MAX_DEADLINE_SECS: u64 = 86_400;

/// Token-bucket settings for one provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Sustained refill rate, in requests per second.
    #[serde(default = "default_per_second")]
    pub per_second: f64,

    /// Bucket capacity; calls beyond it within a second wait for refill.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: default_per_second(),
            burst: default_burst(),
        }
    }
}

impl RateLimitConfig {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if !PER_SECOND_RANGE.contains(&self.per_second) {
            return Err(ConfigError::invalid(
                &format!("throttle.{section}.per_second"),
                format!(
                    "must be between {} and {}",
                    PER_SECOND_RANGE.start(),
                    PER_SECOND_RANGE.end()
                ),
            ));
        }
        if self.burst == 0 {
            return Err(ConfigError::invalid(
                &format!("throttle.{section}.burst"),
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThrottleConfig {
    /// Bucket for the structure provider (ChEMBL).
    #[serde(default)]
    pub structure: RateLimitConfig,

    /// Bucket for the adverse-event provider (openFDA).
    #[serde(default)]
    pub adverse_events: RateLimitConfig,

    /// Lifetime of cached provider responses, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum cached responses before least-recently-used eviction.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Longest a call waits for a rate-limit token before failing, in seconds.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Deadline for a single upstream call, in seconds.
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            structure: RateLimitConfig::default(),
            adverse_events: RateLimitConfig::default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
            max_wait_secs: default_max_wait_secs(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
        }
    }
}

impl ThrottleConfig {
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    #[must_use]
    pub const fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// Check ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.structure.validate("structure")?;
        self.adverse_events.validate("adverse_events")?;
        if self.cache_capacity == 0 {
            return Err(ConfigError::invalid("throttle.cache_capacity", "must be at least 1"));
        }
        if !(1..=MAX_DEADLINE_SECS).contains(&self.upstream_timeout_secs) {
            return Err(ConfigError::invalid(
                "throttle.upstream_timeout_secs",
                format!("must be between 1 and {MAX_DEADLINE_SECS}"),
            ));
        }
        if self.max_wait_secs > MAX_DEADLINE_SECS {
            return Err(ConfigError::invalid(
                "throttle.max_wait_secs",
                format!("must be at most {MAX_DEADLINE_SECS}"),
            ));
        }
        Ok(())
    }
}
