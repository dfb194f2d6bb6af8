use thiserror::Error;

/// Errors that can occur within the users subsystem.
#[derive(Debug, Error)]
pub enum UserError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Token sealing or unsealing failed (bad key material or corrupt blob).
    #[error("Credential seal error: {0}")]
    Seal(String),

    /// No user row for the given id.
    #[error("User not found: {id}")]
    NotFound { id: String },
}

pub type Result<T> = std::result::Result<T, UserError>;
