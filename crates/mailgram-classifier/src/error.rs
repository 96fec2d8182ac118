//! Error types for classification calls.

use thiserror::Error;

/// Errors that can occur while classifying a mail.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// API key not configured.
    #[error("classifier API key is not set")]
    NoApiKey,

    /// Transport-level request failure.
    #[error("classification request failed: {0}")]
    RequestFailed(String),

    /// The model did not produce the expected structured tool call.
    #[error("response is missing the analyze_email tool call")]
    MissingToolCall,

    /// The structured output failed schema validation.
    #[error("response failed schema validation: {0}")]
    SchemaViolation(String),

    /// All attempts exhausted; wraps the last failure.
    #[error("classification failed after {attempts} attempts: {last}")]
    AttemptsExhausted {
        attempts: u32,
        #[source]
        last: Box<ClassifierError>,
    },
}

/// Result type for classifier operations.
pub type Result<T> = std::result::Result<T, ClassifierError>;
