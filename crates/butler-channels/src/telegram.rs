//! Telegram outbound adapter.
//!
//! Butler's user ids are Telegram chat ids stored as strings. Controls map
//! onto an inline keyboard; callback payloads ride through unchanged.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::warn;

use crate::error::ChannelError;
use crate::messenger::Messenger;
use crate::types::Controls;

pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot: Bot::new(bot_token),
        }
    }

    fn keyboard(controls: &Controls) -> InlineKeyboardMarkup {
        let rows: Vec<Vec<InlineKeyboardButton>> = controls
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.callback.clone()))
                    .collect()
            })
            .collect();
        InlineKeyboardMarkup::new(rows)
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(
        &self,
        user_id: &str,
        text: &str,
        controls: Option<&Controls>,
    ) -> Result<(), ChannelError> {
        let chat_id: i64 = user_id
            .parse()
            .map_err(|_| ChannelError::InvalidRecipient(user_id.to_string()))?;

        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(controls) = controls.filter(|c| !c.is_empty()) {
            request = request.reply_markup(Self::keyboard(controls));
        }

        request.await.map_err(|e| {
            warn!(user_id = %user_id, error = %e, "telegram send failed");
            ChannelError::SendFailed(e.to_string())
        })?;
        Ok(())
    }
}
