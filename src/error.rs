//! Error types for the scheduling core and its storage boundary.

use thiserror::Error;

/// Result alias used by every library module.
pub type Result<T> = std::result::Result<T, BookerError>;

#[derive(Debug, Error)]
pub enum BookerError {
    /// Topic was empty after trimming.
    #[error("topic must not be empty")]
    EmptyTopic,

    /// Study duration was zero or negative.
    #[error("duration must be a positive number of minutes, got {0}")]
    InvalidDuration(i64),

    #[error("no review item with id {0}")]
    NotFound(String),

    /// A language or category name that is not part of the closed set.
    #[error("unknown {kind}: {value}")]
    UnknownTag { kind: &'static str, value: String },

    /// Import payload parsed as JSON but was not a list.
    #[error("import rejected: expected a list of review items")]
    NotAList,

    /// Import payload was not valid JSON or held malformed items.
    #[error("import rejected: {0}")]
    MalformedImport(#[source] serde_json::Error),

    /// An imported item parsed but cannot be scheduled.
    #[error("import rejected: item {id} {reason}")]
    InvalidItem { id: String, reason: &'static str },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BookerError {
    /// Whether the error came from user input rather than the environment.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyTopic
                | Self::InvalidDuration(_)
                | Self::NotFound(_)
                | Self::UnknownTag { .. }
                | Self::NotAList
                | Self::MalformedImport(_)
                | Self::InvalidItem { .. }
        )
    }
}
