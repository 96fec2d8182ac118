//! Server configuration.

use std::path::PathBuf;

/// Runtime configuration, resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Directory holding the ledger, kv and account stores.
    pub state_dir: PathBuf,
    /// Telegram bot token.
    pub bot_token: String,
    /// API key for the classification endpoint.
    pub openai_api_key: String,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Model for paying users.
    pub base_model: String,
    /// Model during the trial period.
    pub trial_model: String,
    /// Pub/Sub topic the mailbox watch publishes to.
    pub pubsub_topic: String,
}

impl ServerConfig {
    /// Reads configuration from the environment, applying defaults for
    /// everything optional. Missing required secrets are an error.
    pub fn from_env() -> Result<Self, String> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| "TELEGRAM_BOT_TOKEN is not set".to_string())?;
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| "OPENAI_API_KEY is not set".to_string())?;
        let pubsub_topic = std::env::var("PUBSUB_TOPIC")
            .map_err(|_| "PUBSUB_TOPIC is not set".to_string())?;

        Ok(Self {
            host: std::env::var("MAILGRAM_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("MAILGRAM_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            state_dir: std::env::var("MAILGRAM_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./state")),
            bot_token,
            openai_api_key,
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            base_model: std::env::var("MAILGRAM_BASE_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            trial_model: std::env::var("MAILGRAM_TRIAL_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            pubsub_topic,
        })
    }

    /// Returns the bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            state_dir: PathBuf::from("./state"),
            bot_token: String::new(),
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            base_model: "gpt-4o-mini".to_string(),
            trial_model: "gpt-4o-mini".to_string(),
            pubsub_topic: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }
}
