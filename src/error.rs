//! Typed errors for configuration loading and playlist generation.

use thiserror::Error;

/// Errors raised while loading playlist configurations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid playlist configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("playlist '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

/// Errors that abort a generation run.
///
/// Not-found conditions are not errors; they end the run with a skip outcome.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The run observed its cancellation token
    #[error("generation cancelled")]
    Cancelled,

    /// A catalog query failed
    #[error("catalog query failed: {0:#}")]
    Catalog(anyhow::Error),

    /// The publisher could not store the playlist
    #[error("failed to publish playlist '{name}': {cause:#}")]
    Publish { name: String, cause: anyhow::Error },
}
