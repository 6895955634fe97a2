//! Analysis configuration file support.
//!
//! This module provides the clustering and demand-normalization settings consumed by
//! the pipeline, and utilities for reading them from TOML configuration files.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::domain::HOURS_PER_DAY;
use crate::core::error::{AnalysisError, AnalysisResult};

/// Complete analysis configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub clustering: ClusteringSettings,
    #[serde(default)]
    pub demand: DemandSettings,
}

/// Settings consumed by the cluster engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringSettings {
    /// Number of clusters every method partitions a venue's 24 hours into.
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Fixed seed for reproducible runs; `None` draws one from entropy.
    ///
    /// Written as an integer, or as `"entropy"` in TOML where there is no null.
    #[serde(
        default = "default_random_seed",
        deserialize_with = "deserialize_random_seed",
        serialize_with = "serialize_random_seed"
    )]
    pub random_seed: Option<u64>,
    /// Number of k-means restarts.
    #[serde(default = "default_n_init")]
    pub n_init: usize,
    /// Relative centroid-shift tolerance for k-means.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

/// Settings consumed by the demand matrix builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSettings {
    #[serde(default)]
    pub normalization: NormalizationMethod,
    /// Minimum coefficient of variation below which a venue is degenerate.
    #[serde(default = "default_min_variation")]
    pub min_variation: f64,
}

/// Per-venue normalization applied to hourly demand.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    #[default]
    MinMax,
    ZScore,
}

fn default_k() -> usize {
    3
}

fn default_max_iterations() -> usize {
    300
}

fn default_random_seed() -> Option<u64> {
    Some(42)
}

/// Config value selecting a fresh seed per run.
pub const ENTROPY_SEED: &str = "entropy";

#[derive(Deserialize)]
#[serde(untagged)]
enum SeedSetting {
    Fixed(u64),
    Named(String),
}

fn deserialize_random_seed<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<SeedSetting>::deserialize(deserializer)? {
        None => Ok(None),
        Some(SeedSetting::Fixed(seed)) => Ok(Some(seed)),
        Some(SeedSetting::Named(name)) if name.eq_ignore_ascii_case(ENTROPY_SEED) => Ok(None),
        Some(SeedSetting::Named(name)) => Err(D::Error::custom(format!(
            "random_seed must be a non-negative integer or \"{}\", got \"{}\"",
            ENTROPY_SEED, name
        ))),
    }
}

fn serialize_random_seed<S>(seed: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match seed {
        Some(seed) => serializer.serialize_u64(*seed),
        None => serializer.serialize_str(ENTROPY_SEED),
    }
}

fn default_n_init() -> usize {
    10
}

fn default_tolerance() -> f64 {
    1e-4
}

fn default_parallel() -> bool {
    true
}

fn default_min_variation() -> f64 {
    0.05
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self {
            k: default_k(),
            max_iterations: default_max_iterations(),
            random_seed: default_random_seed(),
            n_init: default_n_init(),
            tolerance: default_tolerance(),
            parallel: default_parallel(),
        }
    }
}

impl Default for DemandSettings {
    fn default() -> Self {
        Self {
            normalization: NormalizationMethod::default(),
            min_variation: default_min_variation(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(AnalysisConfig)` if the file was read, parsed and validated
    /// * `Err(AnalysisError::InvalidConfig)` otherwise
    pub fn from_file<P: AsRef<Path>>(path: P) -> AnalysisResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            AnalysisError::InvalidConfig(format!("Failed to read config file: {}", e))
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> AnalysisResult<Self> {
        let config: AnalysisConfig = toml::from_str(content).map_err(|e| {
            AnalysisError::InvalidConfig(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `peak_hours.toml` in:
    /// 1. Current directory
    /// 2. `rust_backend/` directory
    /// 3. Parent directory
    ///
    /// Falls back to the built-in defaults when no file exists.
    pub fn from_default_location() -> AnalysisResult<Self> {
        let search_paths = [
            PathBuf::from("peak_hours.toml"),
            PathBuf::from("rust_backend/peak_hours.toml"),
            PathBuf::from("../peak_hours.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                log::info!("Loading analysis configuration from {}", path.display());
                return Self::from_file(&path);
            }
        }

        log::debug!("No peak_hours.toml found, using default configuration");
        Ok(Self::default())
    }

    /// Check that all settings are usable.
    pub fn validate(&self) -> AnalysisResult<()> {
        let clustering = &self.clustering;
        if clustering.k < 2 || clustering.k >= HOURS_PER_DAY {
            return Err(AnalysisError::InvalidConfig(format!(
                "k must be between 2 and {}, got {}",
                HOURS_PER_DAY - 1,
                clustering.k
            )));
        }
        if clustering.max_iterations == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_iterations must be positive".to_string(),
            ));
        }
        if clustering.n_init == 0 {
            return Err(AnalysisError::InvalidConfig(
                "n_init must be positive".to_string(),
            ));
        }
        if !(clustering.tolerance.is_finite() && clustering.tolerance > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "tolerance must be a positive number, got {}",
                clustering.tolerance
            )));
        }
        if !(self.demand.min_variation.is_finite() && self.demand.min_variation >= 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "min_variation must be a non-negative number, got {}",
                self.demand.min_variation
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::PeakHoursPipeline;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.clustering.k, 3);
        assert_eq!(config.clustering.random_seed, Some(42));
        assert_eq!(config.demand.normalization, NormalizationMethod::MinMax);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            [clustering]
            k = 2

            [demand]
            normalization = "z_score"
            "#,
        )
        .unwrap();
        assert_eq!(config.clustering.k, 2);
        assert_eq!(config.clustering.max_iterations, 300);
        assert_eq!(config.demand.normalization, NormalizationMethod::ZScore);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_rejects_invalid_k() {
        let err = AnalysisConfig::from_toml_str("[clustering]\nk = 1\n").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
        assert!(AnalysisConfig::from_toml_str("[clustering]\nk = 24\n").is_err());
    }

    #[test]
    fn test_rejects_zero_iterations() {
        assert!(AnalysisConfig::from_toml_str("[clustering]\nmax_iterations = 0\n").is_err());
        assert!(AnalysisConfig::from_toml_str("[clustering]\nn_init = 0\n").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[clustering]\nk = 4\nrandom_seed = 7\n").unwrap();
        let config = AnalysisConfig::from_file(file.path()).unwrap();
        assert_eq!(config.clustering.k, 4);
        assert_eq!(config.clustering.random_seed, Some(7));
    }

    #[test]
    fn test_entropy_seed_from_toml() {
        let config =
            AnalysisConfig::from_toml_str("[clustering]\nrandom_seed = \"entropy\"\n").unwrap();
        assert_eq!(config.clustering.random_seed, None);

        let pipeline = PeakHoursPipeline::new(config.clone()).unwrap();
        let seeds: Vec<u64> = (0..4).map(|_| pipeline.resolve_seed()).collect();
        assert!(seeds.windows(2).any(|pair| pair[0] != pair[1]));

        // Survives a write and re-read instead of falling back to the default seed
        let written = toml::to_string(&config).unwrap();
        assert!(written.contains("random_seed = \"entropy\""));
        assert_eq!(AnalysisConfig::from_toml_str(&written).unwrap(), config);
    }

    #[test]
    fn test_null_seed_from_json() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"clustering": {"random_seed": null}}"#).unwrap();
        assert_eq!(config.clustering.random_seed, None);
    }

    #[test]
    fn test_rejects_unknown_seed_name() {
        let err = AnalysisConfig::from_toml_str("[clustering]\nrandom_seed = \"random\"\n")
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
        assert!(AnalysisConfig::from_toml_str("[clustering]\nrandom_seed = -3\n").is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = AnalysisConfig::from_file("/nonexistent/peak_hours.toml").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }
}
