//! openFDA FAERS adverse-event provider.
//!
//! Uses the `count` form of the drug event endpoint, which returns the
//! reaction terms reported alongside a drug, most frequent first.

use std::time::Duration;

use async_trait::async_trait;
use simtox_core::{EventCount, ProviderError};

use crate::AdverseEventProvider;
use crate::http::{check_response, parse_error, transport_error};

const PROVIDER: &str = "openfda";
const REACTION_FIELD: &str = "patient.reaction.reactionmeddrapt.exact";

#[derive(serde::Deserialize)]
struct CountResponse {
    #[serde(default)]
    results: Vec<CountBucket>,
}

#[derive(serde::Deserialize)]
struct CountBucket {
    term: String,
    count: u64,
}

/// HTTP client for `api.fda.gov/drug/event.json`.
pub struct OpenFdaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenFdaClient {
    /// An empty `api_key` means anonymous access (lower daily quota).
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: &str,
        timeout: Duration,
    ) -> Self {
        let api_key = api_key.trim();
        Self {
            http,
            base_url: base_url.into(),
            api_key: (!api_key.is_empty()).then(|| api_key.to_string()),
            timeout,
        }
    }

    fn count_url(&self, name: &str, limit: usize) -> String {
        let search = format!("patient.drug.medicinalproduct:\"{}\"", name.replace('"', ""));
        let mut url = format!(
            "{}?search={}&count={REACTION_FIELD}&limit={limit}",
            self.base_url,
            urlencoding::encode(&search)
        );
        if let Some(key) = &self.api_key {
            url.push_str("&api_key=");
            url.push_str(&urlencoding::encode(key));
        }
        url
    }
}

#[async_trait]
impl AdverseEventProvider for OpenFdaClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_adverse_events(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Vec<EventCount>, ProviderError> {
        let url = self.count_url(name, limit);
        tracing::debug!(drug = name, limit, "openfda: counting reactions");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, self.timeout, &e))?;
        let resp = check_response(PROVIDER, name, resp).await?;
        let data: CountResponse = resp.json().await.map_err(|e| parse_error(PROVIDER, &e))?;

        Ok(data
            .results
            .into_iter()
            .take(limit)
            .map(|b| EventCount::new(b.term, b.count))
            .collect())
    }
}
