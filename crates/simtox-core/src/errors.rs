//! Cross-cutting error types for simtox.
//!
//! [`ResolutionError`] is a user-input fault raised before any provider is
//! contacted. [`ProviderError`] is shared by every provider client and by the
//! rate limiter/cache that wraps them. Pipeline-level errors live in
//! `simtox-pipeline`, where both converge.

use std::time::Duration;

use thiserror::Error;

/// The raw identifier could not be turned into a compound reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Input was empty or whitespace only.
    #[error("identifier is empty")]
    Empty,

    /// Input was declared a database id but does not match a known pattern.
    #[error("'{0}' is not a recognized database identifier (expected CHEMBL<n> or DB<nnnnn>)")]
    InvalidDatabaseId(String),
}

/// Errors raised by provider calls and the guard that wraps them.
///
/// `Clone` so one upstream outcome can be handed to every caller waiting on
/// the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider has no record for the request.
    #[error("not found in {provider}: {what}")]
    NotFound { provider: String, what: String },

    /// Transport failure, non-success status, or unparseable payload.
    #[error("{provider} upstream error: {message}")]
    Upstream { provider: String, message: String },

    /// The provider did not answer within the deadline.
    #[error("{provider} did not respond within {}s", after.as_secs_f64())]
    UpstreamTimeout { provider: String, after: Duration },

    /// The local token bucket stayed empty for longer than the allowed wait.
    #[error("{provider} rate limit exhausted after waiting {}s", waited.as_secs_f64())]
    RateLimitExceeded { provider: String, waited: Duration },
}

impl ProviderError {
    pub fn not_found(provider: &str, what: impl Into<String>) -> Self {
        Self::NotFound {
            provider: provider.to_string(),
            what: what.into(),
        }
    }

    pub fn upstream(provider: &str, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Map a `reqwest`-style transport error message, distinguishing timeouts.
    pub fn from_transport(
        provider: &str,
        is_timeout: bool,
        after: Duration,
        message: String,
    ) -> Self {
        if is_timeout {
            Self::UpstreamTimeout {
                provider: provider.to_string(),
                after,
            }
        } else {
            Self::Upstream {
                provider: provider.to_string(),
                message,
            }
        }
    }

    /// Short machine-readable label, used for skip reasons and log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Upstream { .. } => "upstream",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
        }
    }
}
