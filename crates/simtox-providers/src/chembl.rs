//! ChEMBL structure provider.
//!
//! Endpoints used (all JSON):
//! - `molecule/{id}` for database ids
//! - `molecule/search?q=` for names (first hit wins)
//! - `molecule?molecule_structures__canonical_smiles__flexmatch=` for SMILES
//! - `similarity/{smiles-or-id}/{threshold}` for similarity search
//!
//! DrugBank ids (`DB00945`) are not ChEMBL keys and are refused before any
//! request is made; look those compounds up by name instead.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use simtox_core::{
    CompoundRecord, CompoundReference, IdentifierKind, ProviderError, SimilarityCandidate,
};

use crate::StructureProvider;
use crate::http::{check_response, parse_error, transport_error};

const PROVIDER: &str = "chembl";

// ── Wire types ─────────────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct MoleculeList {
    #[serde(default)]
    molecules: Vec<Molecule>,
}

#[derive(serde::Deserialize)]
struct Molecule {
    molecule_chembl_id: String,
    pref_name: Option<String>,
    molecule_structures: Option<MoleculeStructures>,
    molecule_properties: Option<BTreeMap<String, serde_json::Value>>,
    /// Only present on similarity results. A percentage, usually as a string.
    similarity: Option<serde_json::Value>,
}

#[derive(serde::Deserialize)]
struct MoleculeStructures {
    canonical_smiles: Option<String>,
}

impl Molecule {
    fn into_record(self) -> CompoundRecord {
        let molecular_properties = self
            .molecule_properties
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, value)| numeric(&value).map(|v| (key, v)))
            .collect();
        CompoundRecord {
            database_id: self.molecule_chembl_id,
            preferred_name: self.pref_name.filter(|n| !n.trim().is_empty()),
            structure: self
                .molecule_structures
                .and_then(|s| s.canonical_smiles)
                .unwrap_or_default(),
            molecular_properties,
        }
    }

    fn into_candidate(mut self) -> Option<SimilarityCandidate> {
        let percent = self.similarity.take().as_ref().and_then(numeric)?;
        Some(SimilarityCandidate {
            compound: self.into_record(),
            score: percent / 100.0,
        })
    }
}

/// Keep scored rows up to `limit`. Also returns how many rows within that
/// window had no score and were dropped.
fn scored_candidates(
    molecules: Vec<Molecule>,
    limit: usize,
) -> (Vec<SimilarityCandidate>, usize) {
    let mut candidates = Vec::with_capacity(limit.min(molecules.len()));
    let mut unscored = 0;
    for molecule in molecules {
        if candidates.len() == limit {
            break;
        }
        match molecule.into_candidate() {
            Some(candidate) => candidates.push(candidate),
            None => unscored += 1,
        }
    }
    (candidates, unscored)
}

/// ChEMBL reports most descriptors as strings (`"180.16"`); flags such as
/// `ro3_pass` are non-numeric and dropped.
fn numeric(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

// ── Client ─────────────────────────────────────────────────────────

/// HTTP client for the ChEMBL web services.
pub struct ChemblClient {
    http: reqwest::Client,
    base_url: String,
    similarity_threshold: u8,
    timeout: Duration,
}

impl ChemblClient {
    /// `similarity_threshold` is the minimum ChEMBL similarity percentage
    /// (40..=100). `timeout` is only used to label transport timeouts; the
    /// deadline itself lives on `http`.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        similarity_threshold: u8,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            similarity_threshold,
            timeout,
        }
    }

    fn molecule_url(&self, id: &str) -> String {
        format!("{}/molecule/{}.json", self.base_url, urlencoding::encode(id))
    }

    fn search_url(&self, name: &str) -> String {
        format!(
            "{}/molecule/search.json?q={}&limit=1",
            self.base_url,
            urlencoding::encode(name)
        )
    }

    fn flexmatch_url(&self, smiles: &str) -> String {
        format!(
            "{}/molecule.json?molecule_structures__canonical_smiles__flexmatch={}&limit=1",
            self.base_url,
            urlencoding::encode(smiles)
        )
    }

    fn similarity_url(&self, query: &str, limit: usize) -> String {
        format!(
            "{}/similarity/{}/{}.json?limit={limit}",
            self.base_url,
            urlencoding::encode(query),
            self.similarity_threshold
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        what: &str,
    ) -> Result<T, ProviderError> {
        tracing::debug!(url, "chembl: GET");
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, self.timeout, &e))?;
        let resp = check_response(PROVIDER, what, resp).await?;
        resp.json().await.map_err(|e| parse_error(PROVIDER, &e))
    }

    async fn first_match(&self, url: &str, what: &str) -> Result<CompoundRecord, ProviderError> {
        let list: MoleculeList = self.get_json(url, what).await?;
        list.molecules
            .into_iter()
            .next()
            .map(Molecule::into_record)
            .ok_or_else(|| ProviderError::not_found(PROVIDER, what))
    }
}

#[async_trait]
impl StructureProvider for ChemblClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_compound(
        &self,
        reference: &CompoundReference,
    ) -> Result<CompoundRecord, ProviderError> {
        let value = reference.value();
        reject_foreign_id(reference)?;
        match reference.kind() {
            IdentifierKind::DatabaseId => {
                let molecule: Molecule = self.get_json(&self.molecule_url(value), value).await?;
                Ok(molecule.into_record())
            }
            IdentifierKind::Name => self.first_match(&self.search_url(value), value).await,
            IdentifierKind::Structure => self.first_match(&self.flexmatch_url(value), value).await,
        }
    }

    async fn fetch_similar(
        &self,
        reference: &CompoundReference,
        limit: usize,
    ) -> Result<Vec<SimilarityCandidate>, ProviderError> {
        reject_foreign_id(reference)?;
        let query = match reference.kind() {
            IdentifierKind::DatabaseId | IdentifierKind::Structure => reference.value().to_string(),
            IdentifierKind::Name => self.fetch_compound(reference).await?.database_id,
        };
        let list: MoleculeList = self
            .get_json(&self.similarity_url(&query, limit), &query)
            .await?;

        let (candidates, unscored) = scored_candidates(list.molecules, limit);
        if unscored > 0 {
            tracing::warn!(
                provider = PROVIDER,
                %query,
                dropped = unscored,
                "similarity results without a score were dropped"
            );
        }
        Ok(candidates)
    }
}

/// Database ids that are valid input but not ChEMBL keys.
fn reject_foreign_id(reference: &CompoundReference) -> Result<(), ProviderError> {
    let value = reference.value();
    if reference.kind() == IdentifierKind::DatabaseId && value.starts_with("DB") {
        return Err(ProviderError::not_found(
            PROVIDER,
            format!("{value} (DrugBank ids are not indexed by ChEMBL; query by name instead)"),
        ));
    }
    Ok(())
}
