//! # simtox-pipeline
//!
//! Builds an [`AggregationReport`] for a compound identifier:
//!
//! 1. Resolve the raw identifier to a [`CompoundReference`].
//! 2. Fetch the query compound and its similarity set from the structure
//!    provider.
//! 3. Rank the similarity set.
//! 4. Fetch adverse events for every ranked candidate with bounded
//!    concurrency, recording failures as skipped compounds.
//! 5. Merge normalized terms into the report.
//!
//! Both providers are called through a [`ProviderGuard`] each; the two guards
//! share one response cache.

pub mod aggregate;
pub mod cancel;
mod error;

pub use cancel::{CancelHandle, CancelSignal};
pub use error::PipelineError;

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use simtox_config::{PipelineConfig, RateLimitConfig, SimtoxConfig, ThrottleConfig};
use simtox_core::resolver::resolve;
use simtox_core::{
    AggregationReport, CompoundRecord, CompoundReference, EventCount, IdentifierKind,
    MAX_EVENT_LIMIT, MAX_SIMILARITY_LIMIT, ProviderError, SimilarityCandidate, ranking,
};
use simtox_guard::{GuardSettings, GuardStats, ProviderGuard, ResponseCache};
use simtox_providers::{AdverseEventProvider, StructureProvider};

/// Guard counters for both providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub structure: GuardStats,
    pub adverse_events: GuardStats,
}

pub struct Pipeline {
    structure: Arc<dyn StructureProvider>,
    events: Arc<dyn AdverseEventProvider>,
    structure_guard: ProviderGuard,
    events_guard: Arc<ProviderGuard>,
    settings: PipelineConfig,
}

fn guard_settings(rate: &RateLimitConfig, throttle: &ThrottleConfig) -> GuardSettings {
    GuardSettings {
        per_second: rate.per_second,
        burst: rate.burst,
        max_wait: throttle.max_wait(),
        upstream_timeout: throttle.upstream_timeout(),
    }
}

fn check_limit(name: &'static str, value: usize, max: usize) -> Result<(), PipelineError> {
    if (1..=max).contains(&value) {
        Ok(())
    } else {
        Err(PipelineError::InvalidLimit { name, value, max })
    }
}

impl Pipeline {
    /// Wire providers into a pipeline. `config` is expected to have passed
    /// [`SimtoxConfig::validate`].
    #[must_use]
    pub fn new(
        structure: Arc<dyn StructureProvider>,
        events: Arc<dyn AdverseEventProvider>,
        config: &SimtoxConfig,
    ) -> Self {
        let throttle = &config.throttle;
        let cache = Arc::new(ResponseCache::new(
            throttle.cache_ttl(),
            throttle.cache_capacity,
        ));
        let structure_guard = ProviderGuard::new(
            structure.name(),
            &guard_settings(&throttle.structure, throttle),
            Arc::clone(&cache),
        );
        let events_guard = Arc::new(ProviderGuard::new(
            events.name(),
            &guard_settings(&throttle.adverse_events, throttle),
            cache,
        ));
        Self {
            structure,
            events,
            structure_guard,
            events_guard,
            settings: config.pipeline.clone(),
        }
    }

    /// Pipeline defaults this instance was built with.
    #[must_use]
    pub const fn settings(&self) -> &PipelineConfig {
        &self.settings
    }

    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            structure: self.structure_guard.stats(),
            adverse_events: self.events_guard.stats(),
        }
    }

    /// Build a report without a cancellation signal.
    ///
    /// # Errors
    ///
    /// See [`Self::build_aggregation_report_with_cancel`].
    pub async fn build_aggregation_report(
        &self,
        raw: &str,
        hint: Option<IdentifierKind>,
        similarity_limit: usize,
        per_compound_event_limit: usize,
    ) -> Result<AggregationReport, PipelineError> {
        self.build_aggregation_report_with_cancel(
            raw,
            hint,
            similarity_limit,
            per_compound_event_limit,
            &CancelSignal::never(),
        )
        .await
    }

    /// Build a report for `raw`, aggregating over up to `similarity_limit`
    /// similar compounds with up to `per_compound_event_limit` terms each.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidLimit`] for a limit outside its range
    /// - [`PipelineError::Resolution`] when `raw` is unusable
    /// - a provider variant when the query compound or its similarity set
    ///   cannot be fetched
    /// - [`PipelineError::Cancelled`] when `cancel` fires and partial reports
    ///   are disabled
    pub async fn build_aggregation_report_with_cancel(
        &self,
        raw: &str,
        hint: Option<IdentifierKind>,
        similarity_limit: usize,
        per_compound_event_limit: usize,
        cancel: &CancelSignal,
    ) -> Result<AggregationReport, PipelineError> {
        check_limit("similarity_limit", similarity_limit, MAX_SIMILARITY_LIMIT)?;
        check_limit(
            "per_compound_event_limit",
            per_compound_event_limit,
            MAX_EVENT_LIMIT,
        )?;
        let reference = resolve(raw, hint)?;
        tracing::debug!(%reference, "resolved identifier");

        let query = until_cancelled(cancel, self.fetch_compound(&reference)).await?;
        let similar =
            until_cancelled(cancel, self.fetch_similar(&query, similarity_limit)).await?;
        let ranked = ranking::rank(
            similar,
            &query.database_id,
            similarity_limit,
            self.settings.min_similarity,
        );
        tracing::debug!(
            query = %query.database_id,
            candidates = ranked.len(),
            "similarity set ranked"
        );

        let concurrency = self
            .settings
            .max_concurrency
            .min(self.events_guard.burst() as usize)
            .max(1);
        let gathered = aggregate::gather(&ranked, concurrency, cancel, |name| {
            self.fetch_adverse_events(name, per_compound_event_limit)
        })
        .await;

        if gathered.cancelled && !self.settings.partial_on_cancel {
            tracing::info!(query = %query.database_id, "report cancelled");
            return Err(PipelineError::Cancelled);
        }
        let merged = aggregate::merge(&ranked, &gathered.outcomes);

        let report = AggregationReport {
            query_reference: reference,
            query_compound: query,
            similarity_set_size: merged.processed,
            skipped_count: merged.skipped.len(),
            skipped: merged.skipped,
            terms: merged.terms,
            partial: gathered.cancelled,
            generated_at: Utc::now(),
        };
        tracing::info!(
            query = %report.query_compound.database_id,
            similarity_set_size = report.similarity_set_size,
            skipped = report.skipped_count,
            terms = report.unique_terms(),
            partial = report.partial,
            "report built"
        );
        Ok(report)
    }

    async fn fetch_compound(
        &self,
        reference: &CompoundReference,
    ) -> Result<CompoundRecord, PipelineError> {
        let key = format!("compound:{}", reference.cache_key());
        let record = self
            .structure_guard
            .execute(&key, || self.structure.fetch_compound(reference))
            .await?;
        Ok(record)
    }

    /// Asks for one extra result, since providers usually return the query
    /// compound itself, which the ranker removes.
    async fn fetch_similar(
        &self,
        query: &CompoundRecord,
        limit: usize,
    ) -> Result<Vec<SimilarityCandidate>, PipelineError> {
        let upstream_limit = (limit + 1).min(MAX_SIMILARITY_LIMIT);
        let reference = CompoundReference::database_id(&query.database_id);
        let key = format!("similar:{}:{upstream_limit}", query.database_id);
        let similar = self
            .structure_guard
            .execute(&key, || self.structure.fetch_similar(&reference, upstream_limit))
            .await?;
        Ok(similar)
    }

    fn fetch_adverse_events(
        &self,
        name: String,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<EventCount>, ProviderError>> + Send + use<> {
        let guard = Arc::clone(&self.events_guard);
        let provider = Arc::clone(&self.events);
        async move {
            let key = format!("events:{}:{limit}", name.to_lowercase());
            guard
                .execute(&key, || provider.fetch_adverse_events(&name, limit))
                .await
        }
    }
}

async fn until_cancelled<T>(
    cancel: &CancelSignal,
    fut: impl Future<Output = Result<T, PipelineError>>,
) -> Result<T, PipelineError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(PipelineError::Cancelled),
        result = fut => result,
    }
}
