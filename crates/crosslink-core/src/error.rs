//! Error types for Crosslink

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using Crosslink's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Crosslink error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Article '{0}' not found. Run `crosslink import` to load the corpus first.")]
    ArticleNotFound(Uuid),

    #[error("Authority source '{0}' not found.")]
    SourceNotFound(Uuid),

    // Repository errors (E100-E199)
    #[error("Content repository unavailable: {0}. The run was aborted; no partial corpus is used.")]
    RepositoryUnavailable(String),

    // Retry errors (E300-E399)
    #[error("Storage operation '{operation}' failed after {attempts} attempts. The current article was skipped.")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
    },

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    Config(String),

    // Cancellation (E700-E799)
    #[error("Run cancelled")]
    Cancelled,

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    Parse(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::ArticleNotFound(_) => "E001",
            Self::SourceNotFound(_) => "E002",
            Self::RepositoryUnavailable(_) => "E100",
            Self::RetriesExhausted { .. } => "E300",
            Self::Database(_) => "E400",
            Self::Config(_) => "E600",
            Self::Cancelled => "E700",
            Self::InvalidInput(_) => "E800",
            Self::Parse(_) => "E801",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Whether this error aborts a whole batch run.
    ///
    /// Per-article errors (retry exhaustion) skip the article and continue;
    /// everything else is fatal to the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RetriesExhausted { .. })
    }
}
