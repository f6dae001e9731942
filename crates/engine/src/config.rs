//! Engine configuration, loaded once per process from TOML.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use gwo_ai::{ModelParameters, RecommendationParams};
use gwo_cache::CacheConfig;
use gwo_core::{EngineError, EngineResult};
use gwo_kpi::{BenchmarkTable, CrunchParameters, KpiParameters, MetricBenchmarkConfig};
use gwo_observability::LoggingConfig;

/// `[server]` section, read by the HTTP binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub request_timeout_ms: u64,
    /// JSON record file loaded at startup.
    pub data_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            request_timeout_ms: 10_000,
            data_path: None,
        }
    }
}

/// Top-level configuration. Every section is optional and falls back to its
/// compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub kpi: KpiParameters,
    pub crunch: CrunchParameters,
    pub models: ModelParameters,
    pub recommendations: RecommendationParams,
    /// metric -> industry / per-department ranges; merged over the built-in table.
    pub benchmarks: BTreeMap<String, MetricBenchmarkConfig>,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
}

impl EngineConfig {
    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text).context("failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.cache.validate()?;
        self.kpi.validate()?;
        self.crunch.validate()?;
        self.models.validate()?;
        self.recommendations.validate()?;
        self.benchmark_table()?;
        if self.server.request_timeout_ms == 0 {
            return Err(EngineError::config("server.request_timeout_ms must be >= 1"));
        }
        Ok(())
    }

    /// Built-in benchmarks with the configured metrics layered on top.
    pub fn benchmark_table(&self) -> EngineResult<BenchmarkTable> {
        Ok(BenchmarkTable::builtin().merged_with(BenchmarkTable::from_config(&self.benchmarks)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwo_observability::LogFormat;
    use gwo_kpi::Position;
    use gwo_core::Department;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.kpi.crunch_threshold_hours, 40.0);
        assert_eq!(config.models.cluster.seed, 42);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn sections_override_individual_values() {
        let config = EngineConfig::from_toml(
            r#"
            [cache]
            ttl_secs = 60
            sweep_interval_secs = 30

            [kpi]
            min_team_sample = 2

            [crunch]
            crunch_weekly_hours = 55.0

            [[crunch.phases]]
            phase = "launch"
            expected_weekly_hours = 50.0
            crunch_probability = 0.8

            [models.cluster]
            seed = 7

            [recommendations]
            min_impact = 0.1

            [logging]
            format = "pretty"

            [benchmarks.avg_satisfaction.departments]
            QA = { low = 7.0, median = 7.5, high = 8.0 }
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.kpi.min_team_sample, 2);
        assert_eq!(config.crunch.crunch_weekly_hours, 55.0);
        assert_eq!(config.crunch.optimal_weekly_hours, 45.0);
        assert_eq!(config.crunch.phases.len(), 1);
        assert_eq!(config.models.cluster.seed, 7);
        assert_eq!(config.models.cluster.clusters, 3);
        assert_eq!(config.recommendations.min_impact, 0.1);
        assert_eq!(config.logging.format, LogFormat::Pretty);

        let table = config.benchmark_table().unwrap();
        let qa = table.lookup("avg_satisfaction", Department::Qa).unwrap();
        assert_eq!(qa.annotate(6.9).position, Position::Below);
    }

    #[test]
    fn invalid_values_are_rejected_at_load() {
        let err = EngineConfig::from_toml("[cache]\nmax_entries = 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("cache.max_entries"));

        let err = EngineConfig::from_toml("[models.burnout.weights]\ncrunch_level = 0.9\n").unwrap_err();
        assert!(format!("{err:#}").contains("sum to 1"));

        assert!(EngineConfig::from_toml("[cache\n").is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = EngineConfig::load(Path::new("/no/such/gwo.toml")).unwrap_err();
        assert!(err.to_string().contains("/no/such/gwo.toml"));
    }
}
