//! Pub/Sub push envelope decoding.
//!
//! The provider wraps its notification in a Pub/Sub envelope whose `data`
//! field is base64-encoded JSON: `{"emailAddress": ..., "historyId": ...}`.

use base64::Engine;
use serde::Deserialize;

use mailgram_models::PushEvent;

/// Outer Pub/Sub push envelope.
#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub message: PubSubMessage,
    #[allow(dead_code)]
    pub subscription: Option<String>,
}

/// The embedded Pub/Sub message.
#[derive(Debug, Deserialize)]
pub struct PubSubMessage {
    /// Base64-encoded notification payload.
    pub data: String,
    #[serde(rename = "messageId")]
    #[allow(dead_code)]
    pub message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationPayload {
    email_address: String,
    history_id: u64,
}

impl PushEnvelope {
    /// Decodes the envelope down to a normalized [`PushEvent`].
    pub fn decode(&self) -> Result<PushEvent, String> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&self.message.data)
            .map_err(|e| format!("payload is not base64: {}", e))?;
        let payload: NotificationPayload = serde_json::from_slice(&decoded)
            .map_err(|e| format!("payload is not a mail notification: {}", e))?;
        Ok(PushEvent::new(&payload.email_address, payload.history_id))
    }
}
