//! The notification channel seam.
//!
//! Rendering and delivery belong to the channel implementation; the pipeline
//! only sees the resulting snapshot (or a failure it reacts to with
//! chat-health remediation).

use async_trait::async_trait;
use thiserror::Error;

use mailgram_models::{Classification, DeliverySnapshot, NormalizedMail};

/// Errors from message delivery.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The send itself failed (network, rejected payload, dead chat).
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// A destination-facing message channel.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Renders a classified mail and delivers it to one destination chat.
    ///
    /// On success returns the snapshot (rendered text, buttons, delivery id)
    /// that becomes the record's canonical delivery state.
    async fn deliver(
        &self,
        chat_id: i64,
        mailbox: &str,
        mail: &NormalizedMail,
        classification: &Classification,
    ) -> Result<DeliverySnapshot, ChannelError>;

    /// Sends a plain diagnostic notice to a chat. Best effort.
    async fn notify(&self, chat_id: i64, text: &str) -> Result<(), ChannelError>;

    /// Chat-health check: the chat is reachable and, for group chats, both
    /// the bot and the owning user still hold the required privileges.
    async fn destination_healthy(&self, chat_id: i64, owner_telegram_id: i64) -> bool;
}
