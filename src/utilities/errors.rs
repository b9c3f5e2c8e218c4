//! Error types shared across the crate.

use thiserror::Error;

/// Errors raised while loading [`crate::config::AppConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML for [`crate::config::AppConfig`].
    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An environment override could not be parsed.
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}
