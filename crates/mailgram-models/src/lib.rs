//! Core data models for Mailgram.
//!
//! Shared types for the mail processing pipeline: normalized mail objects,
//! per-message processing records with their explicit state transitions,
//! classification output, and user accounts with linked mailboxes.

pub mod account;
pub mod mail;
pub mod record;

pub use account::{Account, LinkedMailbox, Subscription, TRIAL_PERIOD_HOURS};
pub use mail::{normalize_mailbox, Attachment, NormalizedMail, PushEvent};
pub use record::{
    Classification, DeliverUpdate, DeliverySnapshot, ImportantUrl, ProcessingRecord, SkipUpdate,
};
