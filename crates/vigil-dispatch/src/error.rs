/// Errors raised while handing events to actions or the export files.
///
/// ```rust
/// use vigil_dispatch::error::DispatchError;
///
/// let err = DispatchError::Action("escalator queue closed".to_string());
/// assert!(err.to_string().contains("escalator"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The action subsystem rejected the batch.
    #[error("Dispatch: action processing failed: {0}")]
    Action(String),

    /// An export record could not be serialized.
    #[error("Dispatch: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dispatch: I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
