//! Webhook server for Mailgram.
//!
//! Terminates the mail provider's push notifications, exposes the
//! resubscription and digest triggers for an external scheduler, and wires
//! the pipeline to its production collaborators (Gmail REST gateway,
//! Telegram channel, OpenAI-compatible classifier).

pub mod config;
pub mod envelope;
pub mod error;
pub mod gmail;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use gmail::GmailGateway;
pub use router::{create_router, serve};
pub use state::AppState;
