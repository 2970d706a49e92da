//! ChEMBL structure provider configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_base_url() -> String {
    "https://www.ebi.ac.uk/chembl/api/data".to_string()
}

/// Default Tanimoto threshold (percent) for ChEMBL similarity searches.
const fn default_similarity_threshold() -> u8 {
    70
}

/// Lowest threshold the ChEMBL similarity endpoint accepts.
const MIN_SIMILARITY_THRESHOLD: u8 = 40;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChemblConfig {
    /// REST API root, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Similarity cutoff in percent (40..=100) sent to `/similarity`.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: u8,
}

impl Default for ChemblConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

impl ChemblConfig {
    /// Check ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an empty URL or an
    /// out-of-range threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("chembl.base_url", "must not be empty"));
        }
        if !(MIN_SIMILARITY_THRESHOLD..=100).contains(&self.similarity_threshold) {
            return Err(ConfigError::invalid(
                "chembl.similarity_threshold",
                format!("must be between {MIN_SIMILARITY_THRESHOLD} and 100"),
            ));
        }
        Ok(())
    }
}
