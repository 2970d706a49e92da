use std::time::Duration;

use simtox_core::{ProviderError, ResolutionError};
use thiserror::Error;

/// Errors that abort a pipeline run.
///
/// Per-candidate provider failures never surface here; they are recorded as
/// skipped compounds in the report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("{provider}: not found: {what}")]
    NotFound { provider: String, what: String },

    #[error("{provider}: upstream error: {message}")]
    Upstream { provider: String, message: String },

    #[error("{provider}: no response within {after:?}")]
    UpstreamTimeout { provider: String, after: Duration },

    #[error("{provider}: rate limit not cleared within {waited:?}")]
    RateLimitExceeded { provider: String, waited: Duration },

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("{name} must be between 1 and {max}, got {value}")]
    InvalidLimit {
        name: &'static str,
        value: usize,
        max: usize,
    },
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound { provider, what } => Self::NotFound { provider, what },
            ProviderError::Upstream { provider, message } => Self::Upstream { provider, message },
            ProviderError::UpstreamTimeout { provider, after } => {
                Self::UpstreamTimeout { provider, after }
            }
            ProviderError::RateLimitExceeded { provider, waited } => {
                Self::RateLimitExceeded { provider, waited }
            }
        }
    }
}
