//! Chat-completions transport.
//!
//! The classifier and digest generator talk to the reasoning service through
//! this seam, so tests can substitute a canned or failing transport.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ClassifierError, Result};

/// One chat-completions round trip.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends a request body and returns the raw response JSON.
    async fn send(&self, body: Value) -> Result<Value>;
}

/// reqwest-backed transport against an OpenAI-compatible endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl HttpTransport {
    /// Creates a transport for `{base_url}/chat/completions`.
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, body: Value) -> Result<Value> {
        if self.api_key.is_empty() {
            return Err(ClassifierError::NoApiKey);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifierError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClassifierError::RequestFailed(format!(
                "status {}: {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ClassifierError::RequestFailed(e.to_string()))
    }
}
