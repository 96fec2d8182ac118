//! Processing records: the persisted audit/state row for one
//! (mailbox, message) pair.
//!
//! A record is created exactly once per pair with `processed_at = None`
//! (in-flight) and reaches a terminal state through exactly one of the
//! transition structs below. The pipeline never deletes records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal reason written by `DeliverUpdate`.
pub const PROCESSED_DETAILS: &str = "Email has been processed";

/// An extracted URL worth surfacing to the user, with its button label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportantUrl {
    pub url: String,
    /// Display text for the link button.
    pub text: String,
}

/// Classifier output for one mail, as persisted in the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Free-text category label (Personal, Work, Finance, ...).
    pub category: String,
    /// Brief content summary.
    pub summary: String,
    /// Importance rating, 0 (spam) through 5 (urgent).
    pub importance: u8,
    /// Deadline or event time extracted verbatim from the mail, in
    /// `HH:mm, DD/MM/YYYY` or `DD/MM/YYYY` form. Not timezone-converted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    /// Concrete action steps, at most five.
    #[serde(default)]
    pub action_steps: Vec<String>,
    /// Notable URLs, at most five, ordered by importance.
    #[serde(default)]
    pub important_urls: Vec<ImportantUrl>,
}

/// What delivery produced: the rendered message and where it landed.
///
/// Stored so "show full text" and back-navigation can reconstruct the
/// original rendered message later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySnapshot {
    /// Rendered message text as sent.
    pub message_text: String,
    /// Rendered button layout, row-major: (label, callback-or-url).
    pub buttons: Vec<Vec<(String, String)>>,
    /// Provider-assigned id of the delivered message.
    pub delivery_id: i64,
    /// Chat the canonical copy went to.
    pub chat_id: i64,
}

/// Persisted state row for one (mailbox, message) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingRecord {
    /// Owning mailbox address (normalized lowercase).
    pub mailbox: String,
    /// Provider message id (or checkpoint, for event-gate records).
    pub message_id: String,

    /// `None` while in flight; set once when the record goes terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// Human-readable terminal reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_details: Option<String>,

    /// Sender, kept for digests and audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Subject, kept for digests and audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Unsubscribe URL carried over from the mail headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsubscribe_url: Option<String>,

    /// Classification snapshot, once the classifier has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,

    /// Delivery snapshot of the first successful send.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliverySnapshot>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl ProcessingRecord {
    /// Creates a fresh in-flight record for a pair.
    pub fn new(mailbox: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            mailbox: mailbox.into(),
            message_id: message_id.into(),
            processed_at: None,
            processing_details: None,
            from: None,
            subject: None,
            unsubscribe_url: None,
            classification: None,
            delivery: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the record has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Applies a skip transition.
    pub fn apply_skip(&mut self, update: SkipUpdate) {
        self.processed_at = Some(Utc::now());
        self.processing_details = Some(update.reason);
        if let Some(classification) = update.classification {
            self.classification = Some(classification);
        }
    }

    /// Applies a delivered transition.
    pub fn apply_deliver(&mut self, update: DeliverUpdate) {
        self.processed_at = Some(Utc::now());
        self.processing_details = Some(PROCESSED_DETAILS.to_string());
        self.classification = Some(update.classification);
        self.delivery = Some(update.delivery);
    }
}

/// Transition: message was not delivered, with the reason why.
///
/// Carries the classification when one was produced (e.g. the zero-importance
/// gate), so the audit trail keeps it even though nothing was sent.
#[derive(Debug, Clone)]
pub struct SkipUpdate {
    pub reason: String,
    pub classification: Option<Classification>,
}

impl SkipUpdate {
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            classification: None,
        }
    }

    pub fn with_classification(reason: impl Into<String>, classification: Classification) -> Self {
        Self {
            reason: reason.into(),
            classification: Some(classification),
        }
    }
}

/// Transition: message was classified and delivered to at least one chat.
#[derive(Debug, Clone)]
pub struct DeliverUpdate {
    pub classification: Classification,
    pub delivery: DeliverySnapshot,
}
