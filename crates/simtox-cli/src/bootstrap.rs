use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use simtox_config::SimtoxConfig;
use simtox_providers::{
    AdverseEventProvider, CatalogProvider, ChemblClient, OpenFdaClient, StructureProvider,
};

use crate::cli::GlobalFlags;

/// Load `.env`, then the layered config (plus `--config`), and validate it.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<SimtoxConfig> {
    let config = SimtoxConfig::load_with_dotenv(flags.config.as_deref()).with_context(|| {
        flags.config.as_ref().map_or_else(
            || "failed to load configuration".to_string(),
            |path| format!("failed to load configuration with {}", path.display()),
        )
    })?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Structure and adverse-event providers for one run.
pub struct Providers {
    pub structure: Arc<dyn StructureProvider>,
    pub events: Arc<dyn AdverseEventProvider>,
}

/// Build providers: a local catalog when given, otherwise ChEMBL and openFDA.
pub fn providers(config: &SimtoxConfig, catalog: Option<&Path>) -> anyhow::Result<Providers> {
    if let Some(path) = catalog {
        let catalog = Arc::new(CatalogProvider::from_path(path)?);
        tracing::debug!(path = %path.display(), compounds = catalog.len(), "using local catalog");
        return Ok(Providers {
            structure: catalog.clone(),
            events: catalog,
        });
    }

    let timeout = config.throttle.upstream_timeout();
    let http = simtox_providers::build_client(timeout).context("failed to build HTTP client")?;
    if !config.openfda.has_api_key() {
        tracing::debug!("no openFDA API key configured; using anonymous quota");
    }
    Ok(Providers {
        structure: Arc::new(ChemblClient::new(
            http.clone(),
            config.chembl.base_url.clone(),
            config.chembl.similarity_threshold,
            timeout,
        )),
        events: Arc::new(OpenFdaClient::new(
            http,
            config.openfda.base_url.clone(),
            &config.openfda.api_key,
            timeout,
        )),
    })
}
