//! Compound identity and structure types.
//!
//! A [`CompoundReference`] is what the resolver produces from user input; a
//! [`CompoundRecord`] is what a structure provider returns for it. Both are
//! immutable once built.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// IdentifierKind
// ---------------------------------------------------------------------------

/// How a raw identifier string should be interpreted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Free-text drug or compound name (e.g. `aspirin`).
    Name,
    /// Database accession code (e.g. `CHEMBL25`, `DB00945`).
    DatabaseId,
    /// Structure line notation (SMILES).
    Structure,
}

impl IdentifierKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::DatabaseId => "database_id",
            Self::Structure => "structure",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CompoundReference
// ---------------------------------------------------------------------------

/// Canonical reference to a compound, as produced by
/// [`resolve`](crate::resolver::resolve).
///
/// Equality is value equality on `(kind, value)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CompoundReference {
    kind: IdentifierKind,
    value: String,
}

impl CompoundReference {
    pub(crate) const fn new(kind: IdentifierKind, value: String) -> Self {
        Self { kind, value }
    }

    /// Reference a record already known by its database id.
    ///
    /// Used after the query compound is fetched, so follow-up calls (similarity
    /// search) key on the stable id rather than the user's free text.
    #[must_use]
    pub fn database_id(id: impl Into<String>) -> Self {
        Self::new(IdentifierKind::DatabaseId, id.into())
    }

    #[must_use]
    pub const fn kind(&self) -> IdentifierKind {
        self.kind
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Stable key fragment for caches and logs: `{kind}:{value}`.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.kind, self.value)
    }
}

impl fmt::Display for CompoundReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.kind)
    }
}

// ---------------------------------------------------------------------------
// CompoundRecord
// ---------------------------------------------------------------------------

/// Structural record for a single compound, as returned by a structure provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompoundRecord {
    /// Provider accession code (e.g. `CHEMBL25`).
    pub database_id: String,
    /// Preferred name. Absent for many research compounds.
    pub preferred_name: Option<String>,
    /// Canonical SMILES.
    pub structure: String,
    /// Numeric molecular descriptors keyed by provider field name.
    #[serde(default)]
    pub molecular_properties: BTreeMap<String, f64>,
}

// ---------------------------------------------------------------------------
// SimilarityCandidate
// ---------------------------------------------------------------------------

/// A compound scored against the query compound. `score` is in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SimilarityCandidate {
    pub compound: CompoundRecord,
    pub score: f64,
}

// ---------------------------------------------------------------------------
// EventCount
// ---------------------------------------------------------------------------

/// Raw `(term, count)` pair from an adverse-event provider, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EventCount {
    pub term: String,
    pub count: u64,
}

impl EventCount {
    #[must_use]
    pub fn new(term: impl Into<String>, count: u64) -> Self {
        Self {
            term: term.into(),
            count,
        }
    }
}
