//! Error types for Lumen core
//!
//! Expected failure modes (unknown session, rejected field value) never surface
//! as errors across the facade. `SessionError` covers the internal paths that can
//! genuinely fail: persistence I/O, configuration, backup and migration.

use std::path::Path;
use thiserror::Error;

/// Result type alias for Lumen core operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Main error type for Lumen core
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    /// IO errors, with the path involved when known
    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session or backup lookup failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// The state manager was already released by cleanup
    #[error("Session '{0}' has been released")]
    Released(String),

    /// Backup creation or restore failed
    #[error("Backup error: {0}")]
    Backup(String),

    /// Session type migration failed
    #[error("Migration error: {0}")]
    Migration(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SessionError {
    /// Create an IO error bound to a path
    pub fn io_at(path: &Path, error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
            path: Some(path.display().to_string()),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a new backup error
    pub fn backup(message: impl Into<String>) -> Self {
        Self::Backup(message.into())
    }

    /// Create a new migration error
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Whether the error came from the filesystem
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

impl From<std::io::Error> for SessionError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(error: toml::de::Error) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<toml::ser::Error> for SessionError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Config(error.to_string())
    }
}
