//! Integration tests for TOML configuration loading.
//!
//! Uses figment::Jail for safe, sandboxed file and env var manipulation.

use figment::{
    Figment, Jail,
    providers::{Format, Serialized, Toml},
};
use pretty_assertions::assert_eq;
use simtox_config::SimtoxConfig;

#[test]
fn loads_pipeline_config_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[pipeline]
similarity_limit = 50
per_compound_event_limit = 25
max_concurrency = 4
min_similarity = 0.5
partial_on_cancel = true
"#,
        )?;

        let config: SimtoxConfig = Figment::from(Serialized::defaults(SimtoxConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.pipeline.similarity_limit, 50);
        assert_eq!(config.pipeline.per_compound_event_limit, 25);
        assert_eq!(config.pipeline.max_concurrency, 4);
        assert!((config.pipeline.min_similarity - 0.5).abs() < f64::EPSILON);
        assert!(config.pipeline.partial_on_cancel);
        assert!(config.validate().is_ok());
        Ok(())
    });
}

#[test]
fn loads_per_provider_rate_limits_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[throttle]
cache_ttl_secs = 600
max_wait_secs = 5

[throttle.structure]
per_second = 2.0
burst = 4

[throttle.adverse_events]
per_second = 4.0
burst = 8
"#,
        )?;

        let config: SimtoxConfig = Figment::from(Serialized::defaults(SimtoxConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.throttle.cache_ttl_secs, 600);
        assert_eq!(config.throttle.max_wait_secs, 5);
        assert_eq!(config.throttle.structure.burst, 4);
        assert_eq!(config.throttle.adverse_events.burst, 8);
        assert!((config.throttle.structure.per_second - 2.0).abs() < f64::EPSILON);
        // Untouched fields keep their defaults.
        assert_eq!(config.throttle.upstream_timeout_secs, 10);
        assert_eq!(config.throttle.cache_capacity, 1024);
        Ok(())
    });
}

#[test]
fn project_local_file_is_picked_up() {
    Jail::expect_with(|jail| {
        jail.create_dir(".simtox")?;
        jail.create_file(
            ".simtox/config.toml",
            r#"
[chembl]
similarity_threshold = 85

[openfda]
api_key = "fda-key"
"#,
        )?;

        let config = SimtoxConfig::load().map_err(|e| e.to_string())?;
        assert_eq!(config.chembl.similarity_threshold, 85);
        assert!(config.openfda.has_api_key());
        Ok(())
    });
}

#[test]
fn explicit_file_overrides_project_file() {
    Jail::expect_with(|jail| {
        jail.create_dir(".simtox")?;
        jail.create_file(".simtox/config.toml", "[pipeline]\nsimilarity_limit = 30\n")?;
        jail.create_file("custom.toml", "[pipeline]\nsimilarity_limit = 40\n")?;

        let config = SimtoxConfig::load_from_file(std::path::Path::new("custom.toml"))
            .map_err(|e| e.to_string())?;
        assert_eq!(config.pipeline.similarity_limit, 40);
        Ok(())
    });
}

#[test]
fn out_of_range_values_fail_validation() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[pipeline]\nsimilarity_limit = 500\n")?;

        let config: SimtoxConfig = Figment::from(Serialized::defaults(SimtoxConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("similarity_limit"));
        Ok(())
    });
}

#[test]
fn wrong_type_is_an_extraction_error() {
    Jail::expect_with(|jail| {
        jail.create_dir(".simtox")?;
        jail.create_file(".simtox/config.toml", "[pipeline]\nsimilarity_limit = \"many\"\n")?;

        let result = SimtoxConfig::load();
        assert!(matches!(result, Err(simtox_config::ConfigError::Figment(_))));
        Ok(())
    });
}
