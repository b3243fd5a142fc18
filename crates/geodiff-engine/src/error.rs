//! Error types for entity lookups and engine configuration

use thiserror::Error;

/// Failure of a collaborator lookup. The pipeline never surfaces these to
/// its callers; each one is logged and read as "not found".
#[derive(Debug, Error)]
pub enum SourceError {
    /// A lookup for one id failed.
    #[error("lookup failed for {id}: {message}")]
    Lookup { id: String, message: String },
    /// The backing service could not be reached.
    #[error("transport error: {0}")]
    Transport(String),
    /// A JSON fixture could not be parsed.
    #[error("malformed fixture: {0}")]
    Fixture(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for loading [`crate::config::EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
