//! Error types for the assistant engine
//!
//! Every failure the engine can hit is recovered at the engine boundary;
//! these types only carry enough detail to log it or show it to the user.

use std::path::PathBuf;
use thiserror::Error;

/// A required setting is missing or malformed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("API key not set.")]
    MissingCredential,

    #[error("Initial instruction not set.")]
    MissingInstruction,

    #[error("Assistant type not set.")]
    MissingMode,

    #[error("Invalid assistant type: {0}")]
    InvalidMode(String),

    #[error("Invalid configuration record: {0}")]
    Record(String),
}

/// Failure to turn one file into context text
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read database file {path:?}: {source}")]
    Database {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
}

/// Failure of a single remote call
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("API connection timed out after {0} seconds.")]
    Timeout(f32),

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Failure to write a patched file back to disk
#[derive(Debug, Error)]
#[error("Failed to apply changes to file: {name}")]
pub struct PatchError {
    pub name: String,
    #[source]
    pub source: std::io::Error,
}

/// Anything an engine call can surface to its caller
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

impl From<reqwest::Error> for InvokeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            InvokeError::Parse(err.to_string())
        } else {
            InvokeError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        assert_eq!(ConfigError::MissingCredential.to_string(), "API key not set.");
        assert_eq!(
            ConfigError::MissingInstruction.to_string(),
            "Initial instruction not set."
        );
        assert_eq!(ConfigError::MissingMode.to_string(), "Assistant type not set.");
    }

    #[test]
    fn test_engine_error_is_transparent() {
        let err: EngineError = ConfigError::MissingCredential.into();
        assert_eq!(err.to_string(), "API key not set.");

        let err: EngineError = InvokeError::Timeout(1.5).into();
        assert_eq!(err.to_string(), "API connection timed out after 1.5 seconds.");
    }
}
