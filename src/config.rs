use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{LakehouseError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "lakehouse.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub quality_gate: QualityGateConfig,
    pub materializer: MaterializerConfig,
    pub catalog: CatalogConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data_lakehouse"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QualityGateConfig {
    /// Minimum number of distinct countries a (dataset, period) group needs to survive
    pub min_countries: usize,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            min_countries: constants::DEFAULT_MIN_COUNTRIES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaterializerConfig {
    /// Rows per normalized segment
    pub batch_size: usize,
    /// Write attempts per segment before the source fails
    pub max_attempts: usize,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::DEFAULT_BATCH_SIZE,
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Dataset keys kept in the catalog even when absent from the metadata
    pub allow_list: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            allow_list: vec![constants::POWER_STATIONS_DATASET.to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Normalize independent sources concurrently
    pub parallel_sources: bool,
    /// Enabled source ids; empty means every registered source
    pub sources: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel_sources: true,
            sources: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `lakehouse.toml` when present.
    ///
    /// An explicit path must exist. Without one, a missing default file yields
    /// the built-in defaults. `LAKEHOUSE_ROOT` overrides the storage root.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Config::default(),
        };

        if let Ok(root) = std::env::var("LAKEHOUSE_ROOT") {
            if !root.trim().is_empty() {
                config.storage.root = PathBuf::from(root);
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            LakehouseError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.materializer.batch_size == 0 {
            return Err(LakehouseError::Config("materializer.batch_size must be positive".into()));
        }
        if self.materializer.max_attempts == 0 {
            return Err(LakehouseError::Config("materializer.max_attempts must be positive".into()));
        }
        if self.quality_gate.min_countries == 0 {
            return Err(LakehouseError::Config("quality_gate.min_countries must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_observed_values() {
        let config = Config::default();
        assert_eq!(config.quality_gate.min_countries, 30);
        assert_eq!(config.materializer.batch_size, 500);
        assert_eq!(config.catalog.allow_list, vec!["Global power stations of the world"]);
        assert!(config.pipeline.sources.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [quality_gate]
            min_countries = 50

            [pipeline]
            sources = ["undata"]
            "#,
        )
        .unwrap();

        assert_eq!(config.quality_gate.min_countries, 50);
        assert_eq!(config.pipeline.sources, vec!["undata"]);
        assert_eq!(config.materializer.batch_size, 500);
        assert!(config.pipeline.parallel_sources);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let config = Config::from_toml("[materializer]\nbatch_size = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(LakehouseError::Config(_))));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let result = Config::load(Some(Path::new("/definitely/not/here/lakehouse.toml")));
        assert!(matches!(result, Err(LakehouseError::Config(_))));
    }
}
