//! Aggregated safety-signal report types.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::compound::{CompoundRecord, CompoundReference};

/// One normalized adverse-event term, summed across the similarity set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AdverseEventTerm {
    /// Normalized (trimmed, lower-cased, whitespace-collapsed) term.
    pub term: String,
    /// Sum of provider counts from every contributing compound.
    pub occurrence_count: u64,
    /// Database ids of the compounds that reported this term. Never empty.
    pub contributing_compounds: BTreeSet<String>,
}

impl AdverseEventTerm {
    /// Report order: count descending, then term ascending.
    #[must_use]
    pub fn report_order(&self, other: &Self) -> Ordering {
        other
            .occurrence_count
            .cmp(&self.occurrence_count)
            .then_with(|| self.term.cmp(&other.term))
    }
}

/// A similarity-set member whose adverse events could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SkippedCompound {
    pub database_id: String,
    /// Machine-readable reason (`not_found`, `upstream`, `upstream_timeout`,
    /// `rate_limit_exceeded`, `missing_name`, `cancelled`).
    pub reason: String,
}

/// Final output of the aggregation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AggregationReport {
    /// Reference the raw identifier resolved to.
    pub query_reference: CompoundReference,
    /// Record fetched for the query compound.
    pub query_compound: CompoundRecord,
    /// Candidates processed, successes and skips alike.
    pub similarity_set_size: usize,
    /// Candidates whose adverse-event lookup failed.
    pub skipped_count: usize,
    /// Skip details, in ranked order.
    pub skipped: Vec<SkippedCompound>,
    /// Terms sorted by count descending, then term ascending.
    pub terms: Vec<AdverseEventTerm>,
    /// True when cancellation cut the fan-out short and the caller asked for
    /// best-effort output.
    pub partial: bool,
    pub generated_at: DateTime<Utc>,
}

impl AggregationReport {
    /// Number of distinct normalized terms.
    #[must_use]
    pub fn unique_terms(&self) -> usize {
        self.terms.len()
    }
}
