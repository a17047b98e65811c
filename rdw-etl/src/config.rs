use crate::common::error::{PipelineError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// What to do with a row that fails required-field validation. Either way the
/// row is skipped and counted; `report` additionally logs each rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRowPolicy {
    Drop,
    #[default]
    Report,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Path to the retail sales flat file.
    pub sales_csv: PathBuf,
    /// Base URL of the product catalog API.
    pub catalog_base_url: String,
    pub timeout_seconds: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            sales_csv: PathBuf::from("retail_sales_dataset.csv"),
            catalog_base_url: "https://fakestoreapi.com".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub db_path: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self { db_path: PathBuf::from("retail_dw.sqlite") }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ValidationConfig {
    pub on_invalid: InvalidRowPolicy,
    /// Minimum post-transform row counts per table. Empty by default so an
    /// empty input batch still completes successfully.
    pub min_rows: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EtlConfig {
    pub sources: SourcesConfig,
    pub warehouse: WarehouseConfig,
    pub validation: ValidationConfig,
}

impl EtlConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    /// A missing default config file is fine; an explicitly given path must
    /// exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    PipelineError::Config(format!("failed to read config file '{}': {e}", p.display()))
                })?;
                toml::from_str(&content)
                    .map_err(|e| PipelineError::Config(format!("invalid config: {e}")))?
            }
            None => {
                let default_path = Path::new("etl.toml");
                if default_path.exists() {
                    let content = fs::read_to_string(default_path)?;
                    toml::from_str(&content)
                        .map_err(|e| PipelineError::Config(format!("invalid config: {e}")))?
                } else {
                    EtlConfig::default()
                }
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = env::var("RDW_SALES_CSV") {
            self.sources.sales_csv = PathBuf::from(path);
        }
        if let Ok(url) = env::var("RDW_CATALOG_URL") {
            self.sources.catalog_base_url = url;
        }
        if let Ok(path) = env::var("RDW_WAREHOUSE_DB") {
            self.warehouse.db_path = PathBuf::from(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_are_omitted() {
        let config: EtlConfig = toml::from_str("").unwrap();
        assert_eq!(config.sources.timeout_seconds, 30);
        assert_eq!(config.validation.on_invalid, InvalidRowPolicy::Report);
        assert!(config.validation.min_rows.is_empty());
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let config: EtlConfig = toml::from_str(
            r#"
            [sources]
            sales_csv = "data/sales.csv"

            [validation]
            on_invalid = "drop"

            [validation.min_rows]
            fact_sales = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.sources.sales_csv, PathBuf::from("data/sales.csv"));
        assert_eq!(config.sources.catalog_base_url, "https://fakestoreapi.com");
        assert_eq!(config.validation.on_invalid, InvalidRowPolicy::Drop);
        assert_eq!(config.validation.min_rows.get("fact_sales"), Some(&100));
    }
}
