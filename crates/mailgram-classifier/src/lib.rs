//! Email classification via an OpenAI-compatible chat-completions endpoint.
//!
//! The classifier sends one mail per call and requires the model to answer
//! through the `analyze_email` tool with a fixed schema; a response without
//! the structured call, or one failing validation, is a hard failure that is
//! retried up to the attempt bound. The digest module reuses the same
//! transport for periodic summary generation.

pub mod client;
pub mod digest;
pub mod error;
pub mod schema;
pub mod transport;

pub use client::{Classifier, ClassifierConfig, Tier, UserContext, MAX_ATTEMPTS};
pub use digest::{generate_digest, DigestPeriod};
pub use error::{ClassifierError, Result};
pub use transport::{ChatTransport, HttpTransport};
