/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use vigil_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "trigger",
///     id: "42".to_string(),
/// };
/// assert!(err.to_string().contains("trigger"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failure.
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A column held a code that does not map to a known enum value.
    #[error("Storage: unexpected value {value} in column '{column}'")]
    UnexpectedValue { column: &'static str, value: i64 },

    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
