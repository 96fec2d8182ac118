//! The mailbox gateway seam.
//!
//! The pipeline never talks to a mail provider directly; it consumes this
//! trait. The production implementation lives in the server crate, tests
//! inject fakes.

use async_trait::async_trait;
use thiserror::Error;

use mailgram_models::{LinkedMailbox, NormalizedMail};

/// Errors from the mail provider.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Fetching messages since the checkpoint failed.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// Stored credentials were rejected.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// Re-establishing the push subscription failed.
    #[error("watch renewal failed: {0}")]
    WatchFailed(String),
}

/// Access to one mail provider.
///
/// `fetch_since` must return only messages added after the mailbox's stored
/// checkpoint, normalized and decoded. No retry happens inside the gateway;
/// a failed fetch fails the event and the next push delivery re-attempts.
#[async_trait]
pub trait MailboxGateway: Send + Sync {
    /// Fetches and normalizes messages newer than the stored checkpoint.
    async fn fetch_since(
        &self,
        mailbox: &LinkedMailbox,
    ) -> Result<Vec<NormalizedMail>, GatewayError>;

    /// Probes whether the stored credentials are still accepted.
    async fn check_authorization(&self, mailbox: &LinkedMailbox) -> Result<(), GatewayError>;

    /// Re-establishes the push subscription; returns the provider's fresh
    /// checkpoint.
    async fn renew_watch(&self, mailbox: &LinkedMailbox) -> Result<u64, GatewayError>;
}
