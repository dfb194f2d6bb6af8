use thiserror::Error;

/// Errors that can occur while delivering an outbound message.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// A message could not be delivered to the remote endpoint.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The recipient id does not fit the channel's addressing scheme.
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    /// The channel-specific configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
