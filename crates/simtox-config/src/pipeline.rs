//! Aggregation pipeline defaults.

use serde::{Deserialize, Serialize};
use simtox_core::{MAX_EVENT_LIMIT, MAX_SIMILARITY_LIMIT};

use crate::error::ConfigError;

/// Default similarity-set size.
const fn default_similarity_limit() -> usize {
    20
}

/// Default adverse-event records pulled per compound.
const fn default_per_compound_event_limit() -> usize {
    10
}

/// Default bound on concurrent adverse-event lookups.
const fn default_max_concurrency() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Number of similar compounds to aggregate over (1..=100).
    #[serde(default = "default_similarity_limit")]
    pub similarity_limit: usize,

    /// Adverse-event terms pulled per compound (1..=1000).
    #[serde(default = "default_per_compound_event_limit")]
    pub per_compound_event_limit: usize,

    /// Concurrent adverse-event lookups. Clamped to the adverse-event
    /// provider's burst size at runtime.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Similarity floor in `[0, 1]`; candidates scoring below it are dropped.
    #[serde(default)]
    pub min_similarity: f64,

    /// On cancellation, return the lookups completed so far as a partial
    /// report instead of failing.
    #[serde(default)]
    pub partial_on_cancel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_limit: default_similarity_limit(),
            per_compound_event_limit: default_per_compound_event_limit(),
            max_concurrency: default_max_concurrency(),
            min_similarity: 0.0,
            partial_on_cancel: false,
        }
    }
}

impl PipelineConfig {
    /// Check ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_SIMILARITY_LIMIT).contains(&self.similarity_limit) {
            return Err(ConfigError::invalid(
                "pipeline.similarity_limit",
                format!("must be between 1 and {MAX_SIMILARITY_LIMIT}"),
            ));
        }
        if !(1..=MAX_EVENT_LIMIT).contains(&self.per_compound_event_limit) {
            return Err(ConfigError::invalid(
                "pipeline.per_compound_event_limit",
                format!("must be between 1 and {MAX_EVENT_LIMIT}"),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::invalid("pipeline.max_concurrency", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(ConfigError::invalid("pipeline.min_similarity", "must be within [0, 1]"));
        }
        Ok(())
    }
}
