//! Error types
//!
//! Only configuration errors ever reach a caller. Sink and effect errors come
//! back from best-effort collaborators and are logged, then dropped.

use std::path::PathBuf;

use thiserror::Error;

/// Failure loading or saving `shade.toml`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write config {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// A visibility report could not be delivered
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("visibility sink is disconnected")]
    Disconnected,
    #[error("failed to write visibility report")]
    Io(#[from] std::io::Error),
    #[error("failed to encode visibility report")]
    Encode(#[from] serde_json::Error),
}

/// A fire-and-forget device effect failed
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("device service unavailable: {0}")]
    Unavailable(&'static str),
    #[error("device effect rejected: {0}")]
    Rejected(String),
}
