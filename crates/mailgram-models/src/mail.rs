//! Mail objects as they flow through the pipeline.
//!
//! A `PushEvent` is what the inbound webhook decodes; `NormalizedMail` is
//! what the mailbox gateway hands back. Neither is persisted verbatim — only
//! fields derived from them end up in processing records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalizes a mailbox address for use as a lookup key.
///
/// Push envelopes, stored accounts and mail headers disagree on casing and
/// stray whitespace; every comparison in the pipeline goes through this.
pub fn normalize_mailbox(address: &str) -> String {
    address.trim().to_lowercase()
}

/// An inbound push notification, decoded from the provider envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Mailbox address the notification refers to (normalized lowercase).
    pub mailbox: String,
    /// Opaque history cursor: "new mail exists since this point".
    pub checkpoint: u64,
}

impl PushEvent {
    /// Creates a push event, normalizing the mailbox address.
    pub fn new(mailbox: &str, checkpoint: u64) -> Self {
        Self {
            mailbox: normalize_mailbox(mailbox),
            checkpoint,
        }
    }

    /// Rate-limit / ledger key for this event: `{mailbox}:{checkpoint}`.
    pub fn intake_key(&self) -> String {
        format!("{}:{}", self.mailbox, self.checkpoint)
    }
}

/// A mail attachment with its decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub data: Vec<u8>,
}

/// A single mail message, fetched and decoded by the mailbox gateway.
///
/// Immutable once constructed; owned by the pipeline for one processing pass.
#[derive(Debug, Clone, Default)]
pub struct NormalizedMail {
    /// Provider-assigned message id, unique per mailbox.
    pub id: String,
    /// Raw `From` header, possibly with display-name wrapping.
    pub from: String,
    /// `Subject` header.
    pub subject: String,
    /// Decoded plain-text body.
    pub body: String,
    /// Short provider snippet of the content.
    pub snippet: String,
    /// First angle-bracketed URL of the `List-Unsubscribe` header, if any.
    pub unsubscribe_url: Option<String>,
    /// Attachments with decoded payloads.
    pub attachments: Vec<Attachment>,
    /// Send date from the `Date` header, when parseable.
    pub date: Option<DateTime<Utc>>,
}

impl NormalizedMail {
    /// A short body preview for user-facing diagnostics.
    pub fn body_preview(&self, max_chars: usize) -> String {
        if self.body.chars().count() <= max_chars {
            return self.body.clone();
        }
        let cut: String = self.body.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mailbox() {
        assert_eq!(normalize_mailbox("  User@Example.COM "), "user@example.com");
        assert_eq!(normalize_mailbox("plain@x.com"), "plain@x.com");
    }

    #[test]
    fn test_push_event_normalizes() {
        let event = PushEvent::new(" U@X.com ", 100);
        assert_eq!(event.mailbox, "u@x.com");
        assert_eq!(event.intake_key(), "u@x.com:100");
    }

    #[test]
    fn test_body_preview_truncates() {
        let mail = NormalizedMail {
            body: "a".repeat(50),
            ..Default::default()
        };
        assert_eq!(mail.body_preview(10).chars().count(), 11); // 10 + ellipsis
        assert_eq!(mail.body_preview(100), "a".repeat(50));
    }
}
