//! Error types for Rowport

use thiserror::Error;

/// Core error type surfaced by row sources, schema providers and settings
#[derive(Error, Debug)]
pub enum RowportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    /// The server rejected the submitted row(s), e.g. a NOT NULL, CHECK or
    /// UNIQUE violation.
    #[error("Constraint violation: {message}")]
    Constraint {
        message: String,
        column: Option<String>,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl RowportError {
    /// Convenience constructor for constraint violations
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
            column: None,
        }
    }

    /// Whether the failure is attributable to the submitted data rather than
    /// to the transport or the server being unavailable.
    ///
    /// The import pipeline retries a rejected batch row by row only for
    /// row-level errors; anything else stops the import.
    pub fn is_row_level(&self) -> bool {
        matches!(self, Self::Constraint { .. } | Self::Query(_))
    }

    /// Column the server blamed for the failure, if it reported one
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::Constraint { column, .. } => column.as_deref(),
            _ => None,
        }
    }
}

/// Result type alias for Rowport operations
pub type Result<T> = std::result::Result<T, RowportError>;
