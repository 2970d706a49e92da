//! Provider setup error types.
//!
//! Per-call failures use [`simtox_core::ProviderError`]; these cover building
//! a provider in the first place.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The catalog file is not valid catalog JSON.
    #[error("failed to parse catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Two entries share a database id.
    #[error("duplicate database id in catalog: {0}")]
    DuplicateId(String),
}
