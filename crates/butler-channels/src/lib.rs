//! `butler-channels` — outbound messaging collaborator.
//!
//! The core never talks to a chat transport directly; it hands text plus up
//! to two rows of button controls to a [`Messenger`]. The Telegram adapter
//! maps those controls onto an inline keyboard.

pub mod error;
pub mod messenger;
pub mod telegram;
pub mod types;

pub use error::{ChannelError, Result};
pub use messenger::Messenger;
pub use telegram::TelegramMessenger;
pub use types::{Button, Controls};
