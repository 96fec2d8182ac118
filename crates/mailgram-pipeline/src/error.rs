//! Error types for the dispatch pipeline.

use thiserror::Error;

use crate::channel::ChannelError;
use crate::gateway::GatewayError;
use mailgram_persistence::PersistenceError;

/// Errors that abort or derail event handling.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Ledger / rate-limit / account store failure. Aborts the whole event:
    /// tracking state must not silently advance past an unreachable store.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Mailbox fetch failure. Aborts the whole event; the push sender will
    /// redeliver.
    #[error("mailbox gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Notification channel failure that escaped per-destination handling.
    #[error("notification channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
