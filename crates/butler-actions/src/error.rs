use butler_github::GithubError;
use butler_users::UserError;
use thiserror::Error;

/// Errors from the pending-action workflow.
///
/// The first four variants are user-facing outcomes, not system failures;
/// [`user_message`](ActionError::user_message) is the single place they are
/// rendered, so no internal identifiers leak to the chat.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Bad or missing input at propose time. No pending row was created.
    #[error("{0}")]
    InvalidInput(String),

    /// No such pending action for this user (wrong id, wrong owner, or
    /// already claimed/cancelled).
    #[error("pending action not found")]
    NotFound,

    /// The proposal outlived its window; the row has been deleted.
    #[error("pending action expired")]
    Expired,

    /// The user has no GitHub credentials stored. Terminal, not retryable.
    #[error("github account not connected")]
    NotConnected,

    /// An external call exceeded its time budget. Retryable by the user.
    #[error("external call timed out")]
    Timeout,

    /// The external system rejected or failed the call.
    #[error("external call failed: {0}")]
    External(String),

    /// A returned diff did not apply cleanly to the current file content.
    #[error("diff application failed: {0}")]
    DiffApply(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    User(#[from] UserError),
}

impl ActionError {
    /// The string shown to the user in chat.
    pub fn user_message(&self) -> String {
        match self {
            ActionError::InvalidInput(msg) => msg.clone(),
            ActionError::NotFound => {
                "I couldn't find that pending action — it may have expired or already been handled.".to_string()
            }
            ActionError::Expired => {
                "That action expired before it was confirmed. Please make the request again.".to_string()
            }
            ActionError::NotConnected => {
                "Your GitHub account isn't connected yet. Say \"connect github\" to link it.".to_string()
            }
            ActionError::Timeout => {
                "GitHub took too long to respond. Nothing was changed — please try again.".to_string()
            }
            ActionError::External(msg) => format!("GitHub request failed: {msg}"),
            ActionError::DiffApply(msg) => {
                format!("I couldn't apply the proposed edit cleanly ({msg}). Please rephrase the change.")
            }
            ActionError::Database(_) | ActionError::Serialization(_) | ActionError::User(_) => {
                "Something went wrong on my side. Please try again.".to_string()
            }
        }
    }

    /// True for errors the user caused and can fix; these are not logged as
    /// system errors.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ActionError::InvalidInput(_)
                | ActionError::NotFound
                | ActionError::Expired
                | ActionError::NotConnected
        )
    }
}

impl From<GithubError> for ActionError {
    fn from(e: GithubError) -> Self {
        match e {
            GithubError::Timeout => ActionError::Timeout,
            other => ActionError::External(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ActionError>;
