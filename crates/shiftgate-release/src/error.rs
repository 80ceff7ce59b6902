//! Release manifest error types.

use thiserror::Error;

/// Errors raised while loading or validating a release manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid release manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid release manifest: {0}")]
    Invalid(String),
}
