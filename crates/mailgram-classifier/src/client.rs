//! The classification client.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use mailgram_models::{Classification, NormalizedMail};

use crate::error::{ClassifierError, Result};
use crate::schema::{analyze_email_tool, parse_classification};
use crate::transport::{ChatTransport, HttpTransport};

/// Total classification attempts per mail (1 initial + 2 retries).
pub const MAX_ATTEMPTS: u32 = 3;

/// Default model for paying users.
pub const DEFAULT_BASE_MODEL: &str = "gpt-4o-mini";

/// Default model during the trial period.
pub const DEFAULT_TRIAL_MODEL: &str = "gpt-4o-mini";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You are an AI assistant that analyzes emails and provides structured \
output with concrete action steps. Your final goal - help the user to manage their inbox more \
effectively. You can categorize emails, summarize their content, rate their importance, and \
suggest action steps based on the email content.";

/// Subscription tier, selecting the model used for the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Trial,
    Paid,
}

/// Per-recipient context the classification call depends on.
#[derive(Debug, Clone, Copy)]
pub struct UserContext {
    /// Hour offset from UTC, used to phrase relative times for the user.
    pub timezone_utc_diff: i32,
    /// Trial or paid tier.
    pub tier: Tier,
}

/// Classifier configuration.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_key: String,
    pub base_url: String,
    pub base_model: String,
    pub trial_model: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            base_model: DEFAULT_BASE_MODEL.to_string(),
            trial_model: DEFAULT_TRIAL_MODEL.to_string(),
        }
    }
}

/// Client for the structured email-analysis call.
pub struct Classifier {
    transport: Arc<dyn ChatTransport>,
    base_model: String,
    trial_model: String,
}

impl Classifier {
    /// Creates a classifier backed by the HTTP transport.
    pub fn new(config: ClassifierConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(config.api_key.clone(), &config.base_url));
        Self::with_transport(transport, config)
    }

    /// Creates a classifier over an injected transport (tests use this).
    pub fn with_transport(transport: Arc<dyn ChatTransport>, config: ClassifierConfig) -> Self {
        Self {
            transport,
            base_model: config.base_model,
            trial_model: config.trial_model,
        }
    }

    /// Classifies one mail, retrying the whole call on any failure.
    ///
    /// Exactly [`MAX_ATTEMPTS`] attempts are made before the terminal error
    /// surfaces; nothing is persisted here, so retries have no side effects.
    pub async fn classify(
        &self,
        mail: &NormalizedMail,
        context: &UserContext,
    ) -> Result<Classification> {
        let body = self.request_body(mail, context);

        let mut last = ClassifierError::RequestFailed("no attempt made".to_string());
        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(body.clone()).await {
                Ok(classification) => return Ok(classification),
                Err(e) => {
                    warn!(
                        message_id = %mail.id,
                        attempt,
                        error = %e,
                        "Classification attempt failed"
                    );
                    last = e;
                }
            }
        }

        Err(ClassifierError::AttemptsExhausted {
            attempts: MAX_ATTEMPTS,
            last: Box::new(last),
        })
    }

    async fn attempt(&self, body: Value) -> Result<Classification> {
        let response = self.transport.send(body).await?;

        let tool_call = &response["choices"][0]["message"]["tool_calls"][0];
        if tool_call["function"]["name"].as_str() != Some("analyze_email") {
            return Err(ClassifierError::MissingToolCall);
        }
        let arguments = tool_call["function"]["arguments"]
            .as_str()
            .ok_or(ClassifierError::MissingToolCall)?;

        parse_classification(arguments)
    }

    fn request_body(&self, mail: &NormalizedMail, context: &UserContext) -> Value {
        let model = match context.tier {
            Tier::Trial => &self.trial_model,
            Tier::Paid => &self.base_model,
        };
        let date = mail
            .date
            .map(|d| d.to_rfc2822())
            .unwrap_or_else(|| "unknown".to_string());

        let user_prompt = format!(
            "Analyze the following email:\n\n\
            Subject: {subject}\n\
            From: {from}\n\
            Date: {date}\n\
            Recipient timezone: UTC{tz:+}\n\
            Body:\n{body}\n\n\
            Provide the following information via the analyze_email tool:\n\
            1. Category of the email: Personal, Work, Finance, Marketing, Bills, Other (specify)\n\
            2. Brief summary of the content (no more than 20 words)\n\
            3. Importance rating from 0 to 5, where:\n\
            0 - spam, newsletter or marketing email without a genuine benefit; all marketing \
            without a real benefit must be rated 0\n\
            1-2 - low importance (notifications from services, etc)\n\
            3-4 - medium importance (work-related, personal, etc)\n\
            5 - high importance or requires immediate attention (urgent, important deadlines)\n\
            4. Concrete action steps (up to 5) based on the email content, with deadlines or \
            time frames if applicable\n\
            5. The deadline or time of the event, extracted verbatim in HH:mm, DD/MM/YYYY or \
            DD/MM/YYYY format, without any time zone conversion\n\
            6. Important URLs worth following (confirmation links, etc), up to 5, ordered by \
            importance. Exclude boilerplate links such as privacy policies, terms of service \
            and generic marketing links\n\n\
            If this is a login, password, OTP or verification code - you MUST extract it and \
            include it in the summary.\n\
            Consider that emails with good discounts or genuinely beneficial promotions may \
            receive a higher rating. But you should really mark spam as spam",
            subject = mail.subject,
            from = mail.from,
            date = date,
            tz = context.timezone_utc_diff,
            body = mail.body,
        );

        json!({
            "model": model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt}
            ],
            "tools": [analyze_email_tool()],
            "tool_choice": {"type": "function", "function": {"name": "analyze_email"}}
        })
    }
}
