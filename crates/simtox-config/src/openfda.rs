//! openFDA adverse-event provider configuration.

use serde::{Deserialize, Serialize};

fn default_base_url() -> String {
    "https://api.fda.gov/drug/event.json".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenFdaConfig {
    /// Drug adverse-event endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional API key. Raises the daily quota; requests work without one.
    #[serde(default)]
    pub api_key: String,
}

impl Default for OpenFdaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
        }
    }
}

impl OpenFdaConfig {
    /// Whether an API key is configured.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}
