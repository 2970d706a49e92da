//! Deterministic similarity ranking.
//!
//! Upstream similarity searches usually come back sorted and limited already,
//! but ordering is re-established here so that the similarity set (and every
//! report built from it) is reproducible for a given provider response.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::compound::SimilarityCandidate;

/// Rank candidates against the query compound.
///
/// - drops the query compound itself (by `database_id`)
/// - drops non-finite scores, clamps the rest into `[0, 1]`
/// - drops scores below `min_score`
/// - keeps the best-scoring entry when a `database_id` repeats
/// - sorts by score descending, then `database_id` ascending
/// - truncates to `limit`
#[must_use]
pub fn rank(
    candidates: Vec<SimilarityCandidate>,
    query_database_id: &str,
    limit: usize,
    min_score: f64,
) -> Vec<SimilarityCandidate> {
    let mut best: HashMap<String, SimilarityCandidate> = HashMap::new();

    for mut candidate in candidates {
        if candidate.compound.database_id == query_database_id || !candidate.score.is_finite() {
            continue;
        }
        candidate.score = candidate.score.clamp(0.0, 1.0);
        if candidate.score < min_score {
            continue;
        }
        match best.get(&candidate.compound.database_id) {
            Some(existing) if existing.score >= candidate.score => {}
            _ => {
                best.insert(candidate.compound.database_id.clone(), candidate);
            }
        }
    }

    let mut ranked: Vec<SimilarityCandidate> = best.into_values().collect();
    ranked.sort_by(compare);
    ranked.truncate(limit);
    ranked
}

/// Total order used by [`rank`]: score descending, then id ascending.
#[must_use]
pub fn compare(a: &SimilarityCandidate, b: &SimilarityCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.compound.database_id.cmp(&b.compound.database_id))
}
