use thiserror::Error;

/// Errors from the scheduling subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Bad user input (unparseable time spec, empty item). The message is
    /// shown to the user as-is.
    #[error("{0}")]
    InvalidInput(String),

    #[error("reminder {id} not found")]
    ReminderNotFound { id: i64 },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
