//! The teloxide-backed notification channel.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, UserId};
use tracing::{debug, warn};

use mailgram_models::{Classification, DeliverySnapshot, NormalizedMail};
use mailgram_pipeline::{ChannelError, NotificationChannel};

use crate::template::{build_buttons, render_message, Button};

/// Sends rendered notifications through the Telegram Bot API.
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    /// Wraps an existing bot instance.
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Creates a channel from a bot token.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self { bot: Bot::new(token) }
    }

    fn keyboard(rows: &[Vec<Button>]) -> InlineKeyboardMarkup {
        let keyboard: Vec<Vec<InlineKeyboardButton>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .filter_map(|button| match button {
                        Button::Callback { label, data } => {
                            Some(InlineKeyboardButton::callback(label.clone(), data.clone()))
                        }
                        // Parse cannot fail for URLs that passed validation,
                        // but skip rather than panic if it somehow does.
                        Button::Url { label, url } => url::Url::parse(url)
                            .ok()
                            .map(|url| InlineKeyboardButton::url(label.clone(), url)),
                    })
                    .collect()
            })
            .collect();
        InlineKeyboardMarkup::new(keyboard)
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    async fn deliver(
        &self,
        chat_id: i64,
        mailbox: &str,
        mail: &NormalizedMail,
        classification: &Classification,
    ) -> Result<DeliverySnapshot, ChannelError> {
        let text = render_message(mail, mailbox, classification);
        let rows = build_buttons(&mail.id, mail.unsubscribe_url.as_deref(), classification);

        let sent = self
            .bot
            .send_message(ChatId(chat_id), &text)
            .parse_mode(ParseMode::Html)
            .reply_markup(Self::keyboard(&rows))
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        debug!(chat_id, message_id = %mail.id, telegram_message = sent.id.0, "Message sent");

        Ok(DeliverySnapshot {
            message_text: text,
            buttons: rows
                .iter()
                .map(|row| row.iter().map(Button::as_snapshot_pair).collect())
                .collect(),
            delivery_id: i64::from(sent.id.0),
            chat_id,
        })
    }

    async fn notify(&self, chat_id: i64, text: &str) -> Result<(), ChannelError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        Ok(())
    }

    /// Mirrors what delivery needs: the chat must be reachable, and in
    /// group chats both the bot and the owning user must still be
    /// administrators. Group and channel ids are negative; positive ids are
    /// private chats with no admin roster to check.
    async fn destination_healthy(&self, chat_id: i64, owner_telegram_id: i64) -> bool {
        // Reachability probe: fails on deleted chats, kicked bots and
        // users who blocked the bot.
        if let Err(e) = self
            .bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
        {
            warn!(chat_id, error = %e, "Chat unreachable");
            return false;
        }

        if chat_id > 0 {
            return true;
        }

        let admins = match self.bot.get_chat_administrators(ChatId(chat_id)).await {
            Ok(admins) => admins,
            Err(e) => {
                warn!(chat_id, error = %e, "Could not list chat administrators");
                return false;
            }
        };
        let bot_id = match self.bot.get_me().await {
            Ok(me) => me.id,
            Err(_) => return false,
        };

        let bot_is_admin = admins.iter().any(|member| member.user.id == bot_id);
        let owner_is_admin = admins
            .iter()
            .any(|member| member.user.id == UserId(owner_telegram_id as u64));

        bot_is_admin && owner_is_admin
    }
}

#[cfg(test)]
mod tests {
    // Delivery itself needs a live Telegram API; rendering and button
    // construction are covered in template.rs.
}
