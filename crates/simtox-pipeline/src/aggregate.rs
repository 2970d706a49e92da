//! Adverse-event fan-out and term merging.
//!
//! Lookups for the ranked similarity set run concurrently under a semaphore;
//! each task reports back with its rank so the merge is independent of
//! completion order.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use simtox_core::normalize::normalize_term;
use simtox_core::{
    AdverseEventTerm, EventCount, ProviderError, SimilarityCandidate, SkippedCompound,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cancel::CancelSignal;

/// Skip reason for candidates without a name to query by.
pub const MISSING_NAME: &str = "missing_name";
/// Skip reason for lookup tasks that died before reporting.
pub const TASK_FAILED: &str = "task_failed";

/// Result of one candidate's lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Events(Vec<EventCount>),
    Skipped(String),
}

/// Outcomes gathered before the set finished or was cancelled, keyed by rank.
#[derive(Debug, Default)]
pub struct Gathered {
    pub outcomes: BTreeMap<usize, CandidateOutcome>,
    pub cancelled: bool,
}

/// Merged view of the gathered outcomes.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Merged {
    pub terms: Vec<AdverseEventTerm>,
    pub skipped: Vec<SkippedCompound>,
    pub processed: usize,
}

/// Run `fetch` for every named candidate, at most `concurrency` at a time.
///
/// Returns early with `cancelled` set if `cancel` fires; tasks still running
/// at that point are aborted.
pub async fn gather<F, Fut>(
    candidates: &[SimilarityCandidate],
    concurrency: usize,
    cancel: &CancelSignal,
    fetch: F,
) -> Gathered
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<EventCount>, ProviderError>> + Send + 'static,
{
    let mut gathered = Gathered::default();
    let mut set = JoinSet::new();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    for (rank, candidate) in candidates.iter().enumerate() {
        let Some(name) = candidate.compound.preferred_name.clone() else {
            gathered
                .outcomes
                .insert(rank, CandidateOutcome::Skipped(MISSING_NAME.to_string()));
            continue;
        };
        let sem = Arc::clone(&semaphore);
        let lookup = fetch(name);
        set.spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return (rank, Err(None));
            };
            (rank, lookup.await.map_err(Some))
        });
    }

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                set.abort_all();
                gathered.cancelled = true;
                return gathered;
            }
            joined = set.join_next() => match joined {
                Some(Ok((rank, Ok(events)))) => {
                    gathered.outcomes.insert(rank, CandidateOutcome::Events(events));
                }
                Some(Ok((rank, Err(err)))) => {
                    let reason = err.as_ref().map_or(TASK_FAILED, ProviderError::kind);
                    let database_id = &candidates[rank].compound.database_id;
                    match &err {
                        Some(err) => {
                            tracing::warn!(%database_id, reason, %err, "skipping candidate");
                        }
                        None => tracing::warn!(%database_id, reason, "skipping candidate"),
                    }
                    gathered
                        .outcomes
                        .insert(rank, CandidateOutcome::Skipped(reason.to_string()));
                }
                Some(Err(join_error)) => {
                    tracing::warn!(%join_error, "adverse-event lookup task failed");
                }
                None => break,
            }
        }
    }

    // A panicked task never reports its rank; account for it here.
    for rank in 0..candidates.len() {
        gathered
            .outcomes
            .entry(rank)
            .or_insert_with(|| CandidateOutcome::Skipped(TASK_FAILED.to_string()));
    }
    gathered
}

/// Merge outcomes in rank order into normalized, sorted terms.
#[must_use]
pub fn merge(
    candidates: &[SimilarityCandidate],
    outcomes: &BTreeMap<usize, CandidateOutcome>,
) -> Merged {
    let mut terms: BTreeMap<String, AdverseEventTerm> = BTreeMap::new();
    let mut skipped = Vec::new();

    for (&rank, outcome) in outcomes {
        let database_id = &candidates[rank].compound.database_id;
        match outcome {
            CandidateOutcome::Events(events) => {
                for event in events {
                    let term = normalize_term(&event.term);
                    if term.is_empty() {
                        continue;
                    }
                    let entry = terms.entry(term.clone()).or_insert_with(|| AdverseEventTerm {
                        term,
                        occurrence_count: 0,
                        contributing_compounds: BTreeSet::new(),
                    });
                    entry.occurrence_count = entry.occurrence_count.saturating_add(event.count);
                    entry.contributing_compounds.insert(database_id.clone());
                }
            }
            CandidateOutcome::Skipped(reason) => skipped.push(SkippedCompound {
                database_id: database_id.clone(),
                reason: reason.clone(),
            }),
        }
    }

    let mut terms: Vec<_> = terms.into_values().collect();
    terms.sort_by(AdverseEventTerm::report_order);
    Merged {
        terms,
        skipped,
        processed: outcomes.len(),
    }
}
