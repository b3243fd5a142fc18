//! Engine configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tuning knobs for one [`crate::DiffEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum lookups in flight within one fan-out stage
    pub max_concurrent_lookups: usize,
    /// Maximum ids per batch entity request
    pub batch_size: usize,
    /// Scheme prefix of content-addressed media URLs
    pub media_url_prefix: String,
    /// Whether the final batch name lookup runs
    pub resolve_names: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: 8,
            batch_size: 100,
            media_url_prefix: "ipfs://".to_string(),
            resolve_names: true,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        Ok(config.clamped())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Loading engine config from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Numeric limits below 1 would stall every fan-out; raise them to 1.
    pub fn clamped(mut self) -> Self {
        self.max_concurrent_lookups = self.max_concurrent_lookups.max(1);
        self.batch_size = self.batch_size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_lookups, 8);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.media_url_prefix, "ipfs://");
        assert!(config.resolve_names);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("batch_size = 25\nresolve_names = false\n").unwrap();
        assert_eq!(config.batch_size, 25);
        assert!(!config.resolve_names);
        assert_eq!(config.max_concurrent_lookups, 8);
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let config = EngineConfig::from_toml_str("max_concurrent_lookups = 0\nbatch_size = 0\n").unwrap();
        assert_eq!(config.max_concurrent_lookups, 1);
        assert_eq!(config.batch_size, 1);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            EngineConfig::from_toml_str("batch_size = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "media_url_prefix = \"ar://\"").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.media_url_prefix, "ar://");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = EngineConfig::load(Path::new("/nonexistent/geodiff.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
