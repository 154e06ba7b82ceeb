//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid config.
//!
//! ```toml
//! [cache]
//! backend = "file"
//! ttl_secs = 600
//! dir = ".pricedash-cache"
//!
//! [provider]
//! kind = "synthetic"
//! synthetic_seed = 7
//!
//! [view]
//! price_field = "close"
//! rebase_to_100 = true
//! ```

use crate::domain::ViewConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "PRICEDASH_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    File,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub ttl_secs: u64,
    /// Only used by the file backend.
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            ttl_secs: 300,
            dir: PathBuf::from(".pricedash-cache"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub synthetic_seed: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Yahoo,
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
            synthetic_seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cache: CacheConfig,
    pub provider: ProviderConfig,
    pub view: ViewConfig,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceField;

    #[test]
    fn empty_toml_is_default() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.provider.kind, ProviderKind::Yahoo);
        assert_eq!(config.view.price_field, PriceField::AdjustedClose);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            [cache]
            backend = "file"

            [view]
            price_field = "close"
            rebase_to_100 = true
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.backend, CacheBackendKind::File);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.view.price_field, PriceField::Close);
        assert!(config.view.rebase_to_100);
        assert!(config.view.show_summary);
        assert_eq!(config.provider.max_retries, 3);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = PipelineConfig::default();
        config.provider.kind = ProviderKind::Synthetic;
        config.cache.backend = CacheBackendKind::None;
        let text = config.to_toml().unwrap();
        assert_eq!(PipelineConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let err = PipelineConfig::from_toml("[cache]\nbackend = \"redis\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricedash.toml");
        std::fs::write(&path, "[provider]\nkind = \"synthetic\"\nsynthetic_seed = 9\n").unwrap();
        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Synthetic);
        assert_eq!(config.provider.synthetic_seed, 9);

        let missing = PipelineConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
