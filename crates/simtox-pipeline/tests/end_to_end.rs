//! End-to-end pipeline runs against in-memory providers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use simtox_config::{RateLimitConfig, SimtoxConfig};
use simtox_core::{
    AdverseEventTerm, CompoundRecord, CompoundReference, EventCount, IdentifierKind,
    ProviderError, ResolutionError, SimilarityCandidate, SkippedCompound,
};
use simtox_pipeline::{CancelSignal, Pipeline, PipelineError};
use simtox_providers::{AdverseEventProvider, StructureProvider};

// ── Stubs ──────────────────────────────────────────────────────────

fn record(id: &str, name: Option<&str>) -> CompoundRecord {
    CompoundRecord {
        database_id: id.to_string(),
        preferred_name: name.map(str::to_string),
        structure: String::new(),
        molecular_properties: BTreeMap::new(),
    }
}

fn candidate(id: &str, name: Option<&str>, score: f64) -> SimilarityCandidate {
    SimilarityCandidate {
        compound: record(id, name),
        score,
    }
}

#[derive(Default)]
struct StubStructure {
    query: Option<CompoundRecord>,
    similar: Vec<SimilarityCandidate>,
    compound_delay: Option<Duration>,
    compound_calls: AtomicUsize,
    similar_calls: AtomicUsize,
}

#[async_trait]
impl StructureProvider for StubStructure {
    fn name(&self) -> &str {
        "stub-structure"
    }

    async fn fetch_compound(
        &self,
        reference: &CompoundReference,
    ) -> Result<CompoundRecord, ProviderError> {
        self.compound_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.compound_delay {
            tokio::time::sleep(delay).await;
        }
        self.query
            .clone()
            .ok_or_else(|| ProviderError::not_found("stub-structure", reference.value()))
    }

    async fn fetch_similar(
        &self,
        _reference: &CompoundReference,
        limit: usize,
    ) -> Result<Vec<SimilarityCandidate>, ProviderError> {
        self.similar_calls.fetch_add(1, Ordering::SeqCst);
        let mut similar = self.similar.clone();
        similar.sort_by(|a, b| b.score.total_cmp(&a.score));
        similar.truncate(limit);
        Ok(similar)
    }
}

#[derive(Default)]
struct StubEvents {
    responses: HashMap<String, Result<Vec<EventCount>, ProviderError>>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl StubEvents {
    fn with(mut self, name: &str, response: Result<Vec<EventCount>, ProviderError>) -> Self {
        self.responses.insert(name.to_string(), response);
        self
    }

    fn delayed(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }
}

#[async_trait]
impl AdverseEventProvider for StubEvents {
    fn name(&self) -> &str {
        "stub-events"
    }

    async fn fetch_adverse_events(
        &self,
        name: &str,
        _limit: usize,
    ) -> Result<Vec<EventCount>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
        self.responses
            .get(name)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::not_found("stub-events", name)))
    }
}

/// Query DB1 (aspirin) with DB2, DB3, DB4 similar at 0.9, 0.7, 0.5. DB1 is
/// also returned by the similarity search, as real providers do.
fn aspirin_structure() -> StubStructure {
    StubStructure {
        query: Some(record("DB1", Some("aspirin"))),
        similar: vec![
            candidate("DB1", Some("aspirin"), 1.0),
            candidate("DB4", Some("Delta"), 0.5),
            candidate("DB2", Some("Bravo"), 0.9),
            candidate("DB3", Some("Charlie"), 0.7),
        ],
        ..StubStructure::default()
    }
}

fn aspirin_events() -> StubEvents {
    StubEvents::default()
        .with("Bravo", Ok(vec![EventCount::new("Headache", 5)]))
        .with(
            "Charlie",
            Ok(vec![
                EventCount::new("headache ", 3),
                EventCount::new("NAUSEA", 2),
            ]),
        )
        .with(
            "Delta",
            Err(ProviderError::upstream("stub-events", "503 Service Unavailable")),
        )
}

fn pipeline(structure: &Arc<StubStructure>, events: &Arc<StubEvents>) -> Pipeline {
    pipeline_with(structure, events, &SimtoxConfig::default())
}

fn pipeline_with(
    structure: &Arc<StubStructure>,
    events: &Arc<StubEvents>,
    config: &SimtoxConfig,
) -> Pipeline {
    Pipeline::new(structure.clone(), events.clone(), config)
}

fn expected_terms() -> Vec<AdverseEventTerm> {
    vec![
        AdverseEventTerm {
            term: "headache".into(),
            occurrence_count: 8,
            contributing_compounds: BTreeSet::from(["DB2".into(), "DB3".into()]),
        },
        AdverseEventTerm {
            term: "nausea".into(),
            occurrence_count: 2,
            contributing_compounds: BTreeSet::from(["DB3".into()]),
        },
    ]
}

// ── Scenarios ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn aggregates_terms_across_similar_compounds() {
    let structure = Arc::new(aspirin_structure());
    let events = Arc::new(aspirin_events());

    let report = pipeline(&structure, &events)
        .build_aggregation_report("aspirin", None, 20, 10)
        .await
        .unwrap();

    assert_eq!(report.query_reference.kind(), IdentifierKind::Name);
    assert_eq!(report.query_compound.database_id, "DB1");
    assert_eq!(report.terms, expected_terms());
    assert_eq!(report.similarity_set_size, 3);
    assert_eq!(report.skipped_count, 1);
    assert_eq!(
        report.skipped,
        vec![SkippedCompound {
            database_id: "DB4".into(),
            reason: "upstream".into(),
        }]
    );
    assert!(!report.partial);
    assert_eq!(events.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn empty_identifier_fails_resolution() {
    let structure = Arc::new(aspirin_structure());
    let events = Arc::new(aspirin_events());

    let err = pipeline(&structure, &events)
        .build_aggregation_report("   ", None, 20, 10)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Resolution(ResolutionError::Empty)));
    assert_eq!(structure.compound_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_compound_aborts_before_event_lookups() {
    let structure = Arc::new(StubStructure::default());
    let events = Arc::new(aspirin_events());

    let err = pipeline(&structure, &events)
        .build_aggregation_report("CHEMBL999999", None, 20, 10)
        .await
        .unwrap_err();

    assert!(
        matches!(&err, PipelineError::NotFound { provider, what }
            if provider == "stub-structure" && what == "CHEMBL999999"),
        "unexpected error: {err:?}"
    );
    assert_eq!(structure.similar_calls.load(Ordering::SeqCst), 0);
    assert_eq!(events.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn all_candidates_failing_yields_empty_report() {
    let structure = Arc::new(aspirin_structure());
    let events = Arc::new(StubEvents::default());

    let report = pipeline(&structure, &events)
        .build_aggregation_report("aspirin", None, 20, 10)
        .await
        .unwrap();

    assert!(report.terms.is_empty());
    assert_eq!(report.similarity_set_size, 3);
    assert_eq!(report.skipped_count, report.similarity_set_size);
    let skipped: Vec<_> = report.skipped.iter().map(|s| s.database_id.as_str()).collect();
    assert_eq!(skipped, vec!["DB2", "DB3", "DB4"]);
    assert!(report.skipped.iter().all(|s| s.reason == "not_found"));
}

#[tokio::test]
async fn invalid_limits_are_rejected() {
    let structure = Arc::new(aspirin_structure());
    let events = Arc::new(aspirin_events());
    let pipeline = pipeline(&structure, &events);

    for (similarity, per_compound) in [(0, 10), (101, 10), (20, 0), (20, 1001)] {
        let err = pipeline
            .build_aggregation_report("aspirin", None, similarity, per_compound)
            .await
            .unwrap_err();
        assert!(
            matches!(err, PipelineError::InvalidLimit { .. }),
            "({similarity}, {per_compound}) gave {err:?}"
        );
    }
    assert_eq!(structure.compound_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn similarity_limit_bounds_the_set() {
    let structure = Arc::new(aspirin_structure());
    let events = Arc::new(aspirin_events());

    let report = pipeline(&structure, &events)
        .build_aggregation_report("aspirin", None, 1, 10)
        .await
        .unwrap();

    assert_eq!(report.similarity_set_size, 1);
    assert_eq!(report.terms.len(), 1);
    assert_eq!(report.terms[0].term, "headache");
    assert_eq!(report.terms[0].occurrence_count, 5);
}

#[tokio::test]
async fn similarity_floor_drops_weak_candidates() {
    let structure = Arc::new(aspirin_structure());
    let events = Arc::new(aspirin_events());
    let mut config = SimtoxConfig::default();
    config.pipeline.min_similarity = 0.6;

    let report = pipeline_with(&structure, &events, &config)
        .build_aggregation_report("aspirin", None, 20, 10)
        .await
        .unwrap();

    assert_eq!(report.similarity_set_size, 2);
    assert_eq!(report.skipped_count, 0);
    assert_eq!(report.terms, expected_terms());
}

#[tokio::test]
async fn unnamed_candidates_are_skipped() {
    let mut structure = aspirin_structure();
    structure.similar.push(candidate("DB5", None, 0.8));
    let structure = Arc::new(structure);
    let events = Arc::new(aspirin_events());

    let report = pipeline(&structure, &events)
        .build_aggregation_report("aspirin", None, 20, 10)
        .await
        .unwrap();

    assert_eq!(report.similarity_set_size, 4);
    assert_eq!(
        report.skipped,
        vec![
            SkippedCompound {
                database_id: "DB5".into(),
                reason: "missing_name".into(),
            },
            SkippedCompound {
                database_id: "DB4".into(),
                reason: "upstream".into(),
            },
        ]
    );
    assert_eq!(events.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn repeated_reports_are_served_from_cache() {
    let structure = Arc::new(aspirin_structure());
    let events = Arc::new(aspirin_events());
    let pipeline = pipeline(&structure, &events);

    let first = pipeline
        .build_aggregation_report("aspirin", None, 20, 10)
        .await
        .unwrap();
    let second = pipeline
        .build_aggregation_report("aspirin", None, 20, 10)
        .await
        .unwrap();

    assert_eq!(first.terms, second.terms);
    assert_eq!(structure.compound_calls.load(Ordering::SeqCst), 1);
    assert_eq!(structure.similar_calls.load(Ordering::SeqCst), 1);
    // The failed lookup is not cached and goes upstream again.
    assert_eq!(events.calls.load(Ordering::SeqCst), 4);

    let stats = pipeline.stats();
    assert_eq!(stats.structure.cache_hits, 2);
    assert_eq!(stats.adverse_events.cache_hits, 2);
}

#[tokio::test]
async fn shared_names_are_fetched_once() {
    let mut structure = aspirin_structure();
    structure.similar.push(candidate("DB6", Some("Bravo"), 0.6));
    let structure = Arc::new(structure);
    let events = Arc::new(aspirin_events());

    let report = pipeline(&structure, &events)
        .build_aggregation_report("aspirin", None, 20, 10)
        .await
        .unwrap();

    assert_eq!(events.calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.terms[0].occurrence_count, 13);
    assert_eq!(
        report.terms[0].contributing_compounds,
        BTreeSet::from(["DB2".into(), "DB3".into(), "DB6".into()])
    );
}

#[tokio::test(start_paused = true)]
async fn report_is_independent_of_completion_order() {
    let structure = Arc::new(aspirin_structure());
    let events = Arc::new(
        aspirin_events()
            .delayed("Bravo", Duration::from_millis(300))
            .delayed("Charlie", Duration::from_millis(200))
            .delayed("Delta", Duration::from_millis(100)),
    );

    let report = pipeline(&structure, &events)
        .build_aggregation_report("aspirin", None, 20, 10)
        .await
        .unwrap();

    assert_eq!(report.terms, expected_terms());
    let headache = &report.terms[0];
    assert_eq!(
        headache.contributing_compounds.iter().collect::<Vec<_>>(),
        vec!["DB2", "DB3"]
    );
}

// ── Throttling ─────────────────────────────────────────────────────

/// One token, refilled far slower than any test runs.
const SINGLE_TOKEN: RateLimitConfig = RateLimitConfig {
    per_second: 0.001,
    burst: 1,
};

#[tokio::test(start_paused = true)]
async fn exhausted_event_quota_skips_remaining_candidates() {
    let structure = Arc::new(aspirin_structure());
    let events = Arc::new(
        aspirin_events().with("Delta", Ok(vec![EventCount::new("Dizziness", 1)])),
    );
    let mut config = SimtoxConfig::default();
    config.throttle.adverse_events = SINGLE_TOKEN;
    config.throttle.max_wait_secs = 0;

    let report = pipeline_with(&structure, &events, &config)
        .build_aggregation_report("aspirin", None, 20, 10)
        .await
        .unwrap();

    assert_eq!(report.similarity_set_size, 3);
    assert_eq!(report.skipped_count, 2);
    assert!(
        report.skipped.iter().all(|s| s.reason == "rate_limit_exceeded"),
        "{:?}",
        report.skipped
    );
    // Which candidate wins the token depends on scheduling; exactly one does.
    let contributors: BTreeSet<_> = report
        .terms
        .iter()
        .flat_map(|t| t.contributing_compounds.iter())
        .collect();
    assert_eq!(contributors.len(), 1, "{contributors:?}");
    assert!(report.unique_terms() >= 1);
    assert_eq!(events.calls.load(Ordering::SeqCst), 1);
    assert!(!report.partial);
}

#[tokio::test(start_paused = true)]
async fn exhausted_structure_quota_aborts_the_report() {
    let structure = Arc::new(aspirin_structure());
    let events = Arc::new(aspirin_events());
    let mut config = SimtoxConfig::default();
    config.throttle.structure = SINGLE_TOKEN;
    config.throttle.max_wait_secs = 0;

    let err = pipeline_with(&structure, &events, &config)
        .build_aggregation_report("aspirin", None, 20, 10)
        .await
        .unwrap_err();

    // The compound lookup takes the only token; the similarity search fails.
    assert!(
        matches!(&err, PipelineError::RateLimitExceeded { provider, .. }
            if provider == "stub-structure"),
        "unexpected error: {err:?}"
    );
    assert_eq!(structure.compound_calls.load(Ordering::SeqCst), 1);
    assert_eq!(structure.similar_calls.load(Ordering::SeqCst), 0);
    assert_eq!(events.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_structure_provider_times_out() {
    let structure = Arc::new(StubStructure {
        compound_delay: Some(Duration::from_secs(5)),
        ..aspirin_structure()
    });
    let events = Arc::new(aspirin_events());
    let mut config = SimtoxConfig::default();
    config.throttle.upstream_timeout_secs = 1;

    let err = pipeline_with(&structure, &events, &config)
        .build_aggregation_report("aspirin", None, 20, 10)
        .await
        .unwrap_err();

    assert!(
        matches!(&err, PipelineError::UpstreamTimeout { provider, after }
            if provider == "stub-structure" && *after == Duration::from_secs(1)),
        "unexpected error: {err:?}"
    );
    assert_eq!(structure.similar_calls.load(Ordering::SeqCst), 0);
    assert_eq!(events.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn settings_reflect_the_pipeline_config() {
    let structure = Arc::new(aspirin_structure());
    let events = Arc::new(aspirin_events());
    let mut config = SimtoxConfig::default();
    config.pipeline.similarity_limit = 7;
    config.pipeline.per_compound_event_limit = 3;

    let pipeline = pipeline_with(&structure, &events, &config);
    assert_eq!(pipeline.settings().similarity_limit, 7);
    assert_eq!(pipeline.settings().per_compound_event_limit, 3);
}

// ── Cancellation ───────────────────────────────────────────────────

fn slow_charlie() -> Arc<StubEvents> {
    Arc::new(aspirin_events().delayed("Charlie", Duration::from_secs(60)))
}

fn cancel_after(delay: Duration) -> CancelSignal {
    let (handle, signal) = CancelSignal::pair();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        handle.cancel();
    });
    signal
}

#[tokio::test(start_paused = true)]
async fn cancellation_fails_by_default() {
    let structure = Arc::new(aspirin_structure());
    let events = slow_charlie();

    let err = pipeline(&structure, &events)
        .build_aggregation_report_with_cancel(
            "aspirin",
            None,
            20,
            10,
            &cancel_after(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn cancellation_returns_partial_report_when_enabled() {
    let structure = Arc::new(aspirin_structure());
    let events = slow_charlie();
    let mut config = SimtoxConfig::default();
    config.pipeline.partial_on_cancel = true;

    let report = pipeline_with(&structure, &events, &config)
        .build_aggregation_report_with_cancel(
            "aspirin",
            None,
            20,
            10,
            &cancel_after(Duration::from_secs(1)),
        )
        .await
        .unwrap();

    assert!(report.partial);
    assert_eq!(report.similarity_set_size, 2);
    assert_eq!(report.skipped_count, 1);
    assert_eq!(
        report.terms,
        vec![AdverseEventTerm {
            term: "headache".into(),
            occurrence_count: 5,
            contributing_compounds: BTreeSet::from(["DB2".into()]),
        }]
    );
}

#[tokio::test]
async fn cancellation_before_start_fails_fast() {
    let structure = Arc::new(aspirin_structure());
    let events = Arc::new(aspirin_events());
    let (handle, signal) = CancelSignal::pair();
    handle.cancel();

    let err = pipeline(&structure, &events)
        .build_aggregation_report_with_cancel("aspirin", None, 20, 10, &signal)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(events.calls.load(Ordering::SeqCst), 0);
}
