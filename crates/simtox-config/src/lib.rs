//! # simtox-config
//!
//! Layered configuration loading for simtox using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`SIMTOX_*` prefix, `__` as separator)
//! 2. Project-level `.simtox/config.toml`
//! 3. User-level `~/.config/simtox/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `SIMTOX_PIPELINE__SIMILARITY_LIMIT` -> `pipeline.similarity_limit`,
//! `SIMTOX_THROTTLE__ADVERSE_EVENTS__PER_SECOND` -> `throttle.adverse_events.per_second`, etc.
//! The `__` (double underscore) separates nested config sections.
//!
//! # Usage
//!
//! ```no_run
//! use simtox_config::SimtoxConfig;
//!
//! let config = SimtoxConfig::load_with_dotenv(None).expect("config");
//! config.validate().expect("valid config");
//! println!("similarity limit: {}", config.pipeline.similarity_limit);
//! ```

mod chembl;
mod error;
mod openfda;
mod pipeline;
mod throttle;

pub use chembl::ChemblConfig;
pub use error::ConfigError;
pub use openfda::OpenFdaConfig;
pub use pipeline::PipelineConfig;
pub use throttle::{RateLimitConfig, ThrottleConfig};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimtoxConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub chembl: ChemblConfig,
    #[serde(default)]
    pub openfda: OpenFdaConfig,
}

impl SimtoxConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Figment`] if a source cannot be read or a value
    /// has the wrong type.
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    /// Load configuration with `.env` file support, optionally layering an
    /// explicit file as [`Self::load_from_file`] does.
    ///
    /// A missing `.env` is not an error.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_with_dotenv(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::figment_with(explicit)
            .extract()
            .map_err(ConfigError::from)
    }

    /// Load configuration with an explicit TOML file layered above the
    /// user-global and project files (below environment variables).
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::figment_with(Some(path)).extract().map_err(ConfigError::from)
    }

    /// Build the figment provider chain.
    ///
    /// This is public so tests can inspect the figment directly or add
    /// additional providers on top.
    pub fn figment() -> Figment {
        Self::figment_with(None)
    }

    fn figment_with(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        // Layer 2: Project-local config
        let local_path = PathBuf::from(".simtox/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Explicit --config file
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }

        // Layer 4: Environment variables (highest priority)
        figment.merge(Env::prefixed("SIMTOX_").split("__"))
    }

    /// Check every section's ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.throttle.validate()?;
        self.chembl.validate()?;
        Ok(())
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("simtox").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimtoxConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.openfda.has_api_key());
        assert_eq!(config.pipeline.similarity_limit, 20);
    }

    #[test]
    fn figment_builds_without_files() {
        let figment = SimtoxConfig::figment();
        let config: SimtoxConfig = figment.extract().expect("should extract defaults");
        assert_eq!(config.pipeline.per_compound_event_limit, 10);
        assert_eq!(config.throttle.max_wait_secs, 30);
    }
}
