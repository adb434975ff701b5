//! Error types for RTDL core

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in RTDL core
#[derive(Debug, Error)]
pub enum RtdlError {
    #[error("Authorization required")]
    Unauthenticated,

    #[error("No valid magnet link or URL found in: {0}")]
    InvalidReference(String),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Download engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Download engine error {code}: {message}")]
    Engine { code: i64, message: String },

    #[error("Download not found: {0}")]
    NotFound(String),

    #[error("No files to delete")]
    NothingToDelete,

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RtdlError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RtdlError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

// Any transport-level failure talking to the engine means it could not be reached
impl From<reqwest::Error> for RtdlError {
    fn from(error: reqwest::Error) -> Self {
        RtdlError::EngineUnavailable(error.to_string())
    }
}

impl From<RtdlError> for String {
    fn from(error: RtdlError) -> Self {
        error.to_string()
    }
}
