//! Error types for record reconstruction and replay.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for the reconstruct-and-replay pipeline.
///
/// Every variant is fatal: there is no retry policy.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Manifest is unreadable or malformed, or holds an out-of-range value.
    #[error("Failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// An image file could not be read, or the report could not be written.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest and the loaded blobs disagree.
    #[error("Inconsistent record: {0}")]
    Consistency(String),

    /// The offload runtime could not be loaded or a runtime call failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ReplayError {
    pub(crate) fn decode(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ReplayError::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReplayError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn consistency(message: impl Into<String>) -> Self {
        ReplayError::Consistency(message.into())
    }
}

/// Error raised at the offload runtime boundary.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to load offload runtime: {0}")]
    Load(String),
    #[error("Failed to resolve runtime symbol {symbol}: {message}")]
    Symbol { symbol: String, message: String },
    #[error("Kernel launch failed with status {code}")]
    Launch { code: i32 },
    #[error("Failed to unregister descriptor: {0}")]
    Unregister(String),
}
