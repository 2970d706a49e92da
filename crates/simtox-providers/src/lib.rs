//! # simtox-providers
//!
//! Structure and adverse-event provider clients for simtox.
//!
//! Two capability traits sit at the boundary between the pipeline and the
//! outside world:
//! - [`StructureProvider`]: compound lookup and similarity search
//! - [`AdverseEventProvider`]: per-compound adverse-event counts
//!
//! Implementations:
//! - [`ChemblClient`] (ChEMBL REST API)
//! - [`OpenFdaClient`] (openFDA FAERS drug event API)
//! - [`CatalogProvider`] (local JSON catalog, both traits, no network)
//!
//! Every failure is reported as a [`ProviderError`]; none of the
//! implementations retry or cache. That is the guard layer's job.

pub mod catalog;
pub mod chembl;
pub mod openfda;

mod error;
mod http;

pub use catalog::CatalogProvider;
pub use chembl::ChemblClient;
pub use error::CatalogError;
pub use http::build_client;
pub use openfda::OpenFdaClient;

use async_trait::async_trait;
use simtox_core::{
    CompoundRecord, CompoundReference, EventCount, ProviderError, SimilarityCandidate,
};

// ── Traits ─────────────────────────────────────────────────────────

/// Source of compound structures and structural similarity.
#[async_trait]
pub trait StructureProvider: Send + Sync {
    /// Provider name used in errors, logs, and cache keys.
    fn name(&self) -> &str;

    /// Fetch the record for `reference`.
    ///
    /// # Errors
    ///
    /// [`ProviderError::NotFound`] when no compound matches; any other variant
    /// for transport or upstream failures.
    async fn fetch_compound(
        &self,
        reference: &CompoundReference,
    ) -> Result<CompoundRecord, ProviderError>;

    /// Fetch up to `limit` compounds structurally similar to `reference`.
    ///
    /// Results may include the query compound itself and are not guaranteed
    /// to be ordered; callers rank them.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fetch_compound`].
    async fn fetch_similar(
        &self,
        reference: &CompoundReference,
        limit: usize,
    ) -> Result<Vec<SimilarityCandidate>, ProviderError>;
}

/// Source of post-market adverse-event reports.
#[async_trait]
pub trait AdverseEventProvider: Send + Sync {
    /// Provider name used in errors, logs, and cache keys.
    fn name(&self) -> &str;

    /// Fetch up to `limit` `(term, count)` pairs reported for the compound
    /// named `name`. Terms are returned as the provider spells them.
    ///
    /// # Errors
    ///
    /// [`ProviderError::NotFound`] when the provider has no reports for the
    /// name; any other variant for transport or upstream failures.
    async fn fetch_adverse_events(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Vec<EventCount>, ProviderError>;
}
