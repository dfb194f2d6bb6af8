use async_trait::async_trait;

use crate::error::ChannelError;
use crate::types::Controls;

/// Common interface for anything that can push a message to a user.
///
/// Implementations must be `Send + Sync` so the scheduler engine and request
/// handlers can share one instance across Tokio tasks.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Deliver `text` to `user_id`, optionally with button controls.
    ///
    /// Failure means the message was (as far as we know) not delivered;
    /// callers decide whether that is retryable. The scheduler leaves a
    /// reminder undone on failure so the next tick retries it.
    async fn send(
        &self,
        user_id: &str,
        text: &str,
        controls: Option<&Controls>,
    ) -> Result<(), ChannelError>;
}
