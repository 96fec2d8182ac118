//! The mail-event dispatch pipeline.
//!
//! Consumes push events, drives each (mailbox, message) unit of work through
//! its state machine — intake dedup, ledger gate, filter chain, classification,
//! importance gate, fan-out delivery — and records every terminal outcome in
//! the history ledger. Mailbox access and message delivery are reached
//! through injected trait objects so the pipeline can be exercised with
//! fakes.

pub mod address;
pub mod channel;
pub mod error;
pub mod gateway;
pub mod pipeline;

pub use address::extract_address;
pub use channel::{ChannelError, NotificationChannel};
pub use error::{PipelineError, Result};
pub use gateway::{GatewayError, MailboxGateway};
pub use pipeline::{EventOutcome, Pipeline, SweepReport, RATE_LIMIT_WINDOW_MINUTES};
