//! Offline catalog provider.
//!
//! A JSON file of compounds with their structures and adverse-event counts,
//! serving both provider traits without network access. Similarity is
//! computed locally from path fingerprints.
//!
//! ```json
//! {
//!   "compounds": [
//!     {
//!       "database_id": "CHEMBL25",
//!       "preferred_name": "ASPIRIN",
//!       "synonyms": ["acetylsalicylic acid"],
//!       "structure": "CC(=O)Oc1ccccc1C(=O)O",
//!       "molecular_properties": {"mw_freebase": 180.16},
//!       "adverse_events": [{"term": "NAUSEA", "count": 12}]
//!     }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use simtox_core::fingerprint::Fingerprint;
use simtox_core::ranking;
use simtox_core::{
    CompoundRecord, CompoundReference, EventCount, IdentifierKind, ProviderError,
    SimilarityCandidate,
};

use crate::error::CatalogError;
use crate::{AdverseEventProvider, StructureProvider};

const PROVIDER: &str = "catalog";

#[derive(Debug, serde::Deserialize)]
struct CatalogFile {
    compounds: Vec<CatalogEntry>,
}

#[derive(Debug, serde::Deserialize)]
struct CatalogEntry {
    #[serde(flatten)]
    record: CompoundRecord,
    #[serde(default)]
    synonyms: Vec<String>,
    #[serde(default)]
    adverse_events: Vec<EventCount>,
}

impl CatalogEntry {
    fn answers_to(&self, name: &str) -> bool {
        let name = name.trim();
        self.record
            .preferred_name
            .iter()
            .chain(&self.synonyms)
            .any(|n| n.trim().eq_ignore_ascii_case(name))
    }
}

/// In-memory compound catalog loaded from JSON.
#[derive(Debug)]
pub struct CatalogProvider {
    entries: Vec<CatalogEntry>,
    fingerprints: Vec<Fingerprint>,
}

impl CatalogProvider {
    /// Load a catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the file cannot be read, is not catalog
    /// JSON, or repeats a database id.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: display.clone(),
            source,
        })?;
        let file: CatalogFile = serde_json::from_str(&raw).map_err(|source| {
            CatalogError::Parse {
                path: display,
                source,
            }
        })?;
        Self::from_entries(file.compounds)
    }

    fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.record.database_id.to_ascii_uppercase()) {
                return Err(CatalogError::DuplicateId(entry.record.database_id.clone()));
            }
        }
        let fingerprints = entries
            .iter()
            .map(|e| Fingerprint::from_structure(&e.record.structure))
            .collect();
        tracing::debug!(compounds = entries.len(), "catalog: loaded");
        Ok(Self {
            entries,
            fingerprints,
        })
    }

    /// Number of compounds in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, reference: &CompoundReference) -> Option<usize> {
        let value = reference.value();
        self.entries.iter().position(|e| match reference.kind() {
            IdentifierKind::DatabaseId => e.record.database_id.eq_ignore_ascii_case(value),
            IdentifierKind::Name => e.answers_to(value),
            IdentifierKind::Structure => e.record.structure == value,
        })
    }
}

#[async_trait]
impl StructureProvider for CatalogProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_compound(
        &self,
        reference: &CompoundReference,
    ) -> Result<CompoundRecord, ProviderError> {
        self.find(reference)
            .map(|i| self.entries[i].record.clone())
            .ok_or_else(|| ProviderError::not_found(PROVIDER, reference.value()))
    }

    async fn fetch_similar(
        &self,
        reference: &CompoundReference,
        limit: usize,
    ) -> Result<Vec<SimilarityCandidate>, ProviderError> {
        // A structure missing from the catalog can still be searched by its
        // own fingerprint; names and ids must exist.
        let query = match (self.find(reference), reference.kind()) {
            (Some(i), _) => self.fingerprints[i].clone(),
            (None, IdentifierKind::Structure) => Fingerprint::from_structure(reference.value()),
            (None, _) => return Err(ProviderError::not_found(PROVIDER, reference.value())),
        };

        let mut candidates: Vec<_> = self
            .entries
            .iter()
            .zip(&self.fingerprints)
            .map(|(entry, fp)| SimilarityCandidate {
                compound: entry.record.clone(),
                score: query.tanimoto(fp),
            })
            .filter(|c| c.score > 0.0)
            .collect();
        candidates.sort_by(ranking::compare);
        candidates.truncate(limit);
        Ok(candidates)
    }
}

#[async_trait]
impl AdverseEventProvider for CatalogProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_adverse_events(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Vec<EventCount>, ProviderError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.answers_to(name))
            .filter(|e| !e.adverse_events.is_empty())
            .ok_or_else(|| ProviderError::not_found(PROVIDER, name))?;

        let mut events = entry.adverse_events.clone();
        events.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
        events.truncate(limit);
        Ok(events)
    }
}
