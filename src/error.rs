// src/error.rs

use crate::backends::BackendError;
use thiserror::Error;

/// Core error types for Deskforge
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// State store initialization error
    #[error("Failed to initialize state store: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// A backend could not be reached or an operation on it failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Unsupported host or missing required tool; nothing was mutated
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// The user declined a confirmation prompt; nothing was mutated
    #[error("Aborted by user: {0}")]
    UserAborted(String),

    /// A termination signal arrived while work was in progress
    #[error("Interrupted by signal {signal}")]
    Interrupted { signal: i32 },

    /// Manifest parsing or validation errors
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lookup of a named entity failed
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Another invocation holds the state lock
    #[error("State directory is locked: {0}")]
    Locked(String),

    /// Backup archive creation errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// Terminal prompt errors
    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

impl Error {
    /// True for errors that stop the invocation before any mutation happened
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::PreconditionFailed(_) | Error::Locked(_) | Error::Config(_) | Error::Manifest(_)
        )
    }
}

/// Result type alias using Deskforge's Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PreconditionFailed("sudo is not installed".to_string());
        assert_eq!(err.to_string(), "Precondition failed: sudo is not installed");

        let err = Error::Interrupted { signal: 2 };
        assert_eq!(err.to_string(), "Interrupted by signal 2");
    }

    #[test]
    fn test_backend_error_is_transparent() {
        let err: Error = BackendError::Unavailable {
            tool: "flatpak".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "flatpak is not available on this host");
    }

    #[test]
    fn test_precondition_classification() {
        assert!(Error::Locked("held by pid 42".to_string()).is_precondition());
        assert!(!Error::UserAborted("declined".to_string()).is_precondition());
        assert!(!Error::Interrupted { signal: 15 }.is_precondition());
    }
}
