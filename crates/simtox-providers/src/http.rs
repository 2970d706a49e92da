//! Shared HTTP helpers for provider clients.
//!
//! Centralizes status-code checks (404 → not found, 429 with `Retry-After`
//! parsing, other non-success → upstream error) and transport error mapping
//! so individual provider modules stay focused on request construction and
//! response mapping.

use std::time::Duration;

use simtox_core::ProviderError;

/// Build the shared HTTP client used by all remote providers.
///
/// # Errors
///
/// Returns the `reqwest` error if the TLS backend cannot be initialized.
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("simtox/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

/// Check an HTTP response for common error conditions.
///
/// Returns the response unchanged on success. Handles:
/// - **404 Not Found** → [`ProviderError::NotFound`] describing `what`.
/// - **429 Too Many Requests** → [`ProviderError::Upstream`] carrying the
///   `Retry-After` value (falls back to 60 s if absent or unparseable).
/// - **Other non-success status** → [`ProviderError::Upstream`] with status
///   code and response body.
pub async fn check_response(
    provider: &str,
    what: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status == 404 {
        return Err(ProviderError::not_found(provider, what));
    }
    if status == 429 {
        let retry_after = parse_retry_after(&resp);
        return Err(ProviderError::upstream(
            provider,
            format!("rate limited by provider, retry after {retry_after}s"),
        ));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::upstream(
            provider,
            format!("API error ({}): {body}", status.as_u16()),
        ));
    }
    Ok(resp)
}

/// Map a `reqwest` transport error, distinguishing deadline expiry.
pub fn transport_error(provider: &str, timeout: Duration, err: &reqwest::Error) -> ProviderError {
    ProviderError::from_transport(provider, err.is_timeout(), timeout, err.to_string())
}

/// Map a body decoding error.
pub fn parse_error(provider: &str, err: &reqwest::Error) -> ProviderError {
    ProviderError::upstream(provider, format!("parse error: {err}"))
}

/// Parse the `Retry-After` header as seconds, falling back to 60 s.
fn parse_retry_after(resp: &reqwest::Response) -> u64 {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60)
}
