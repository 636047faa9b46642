use vigil_dispatch::error::DispatchError;
use vigil_storage::error::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum EventsError {
    #[error("Events: {0}")]
    Storage(#[from] StorageError),

    #[error("Events: {0}")]
    Dispatch(#[from] DispatchError),

    /// A correlation formula could not be parsed or evaluated.
    #[error("Events: correlation {correlationid} formula \"{formula}\": {message}")]
    Formula {
        correlationid: u64,
        formula: String,
        message: String,
    },

    /// A correlation formula refers to a condition the rule does not have.
    #[error("Events: correlation {correlationid} refers to unknown condition {conditionid}")]
    UnknownCondition { correlationid: u64, conditionid: u64 },
}

pub type Result<T> = std::result::Result<T, EventsError>;
