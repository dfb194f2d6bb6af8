use thiserror::Error;

/// Errors from the code-hosting collaborator.
#[derive(Debug, Error)]
pub enum GithubError {
    /// The API answered with a non-success status.
    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The call exceeded its wall-clock budget. Retryable by the user.
    #[error("GitHub request timed out")]
    Timeout,

    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("GitHub request failed: {0}")]
    Http(String),

    /// The response body did not match the expected shape.
    #[error("Unexpected GitHub response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GithubError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GithubError::Timeout
        } else if e.is_decode() {
            GithubError::Decode(e.to_string())
        } else {
            GithubError::Http(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, GithubError>;
