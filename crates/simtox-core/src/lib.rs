//! # simtox-core
//!
//! Core types, identifier resolution, and similarity ranking for simtox.
//!
//! This crate provides the foundational types shared across all simtox crates:
//! - Compound references, records, and similarity candidates
//! - The aggregated adverse-event report
//! - Cross-cutting error types (`ResolutionError`, `ProviderError`)
//! - The identifier resolver (name vs. database id vs. structure string)
//! - The deterministic similarity ranker
//! - Binary structure fingerprints and Tanimoto similarity
//! - Adverse-event term normalization

pub mod compound;
pub mod errors;
pub mod fingerprint;
pub mod normalize;
pub mod ranking;
pub mod report;
pub mod resolver;

pub use compound::{
    CompoundRecord, CompoundReference, EventCount, IdentifierKind, SimilarityCandidate,
};
pub use errors::{ProviderError, ResolutionError};
pub use report::{AdverseEventTerm, AggregationReport, SkippedCompound};

/// Hard cap on the similarity-set size, bounding adverse-event fan-out.
pub const MAX_SIMILARITY_LIMIT: usize = 100;

/// Ceiling on per-compound adverse-event records (openFDA count endpoint max).
pub const MAX_EVENT_LIMIT: usize = 1000;
