//! Periodic digest summaries over processed mail records.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde_json::{json, Value};

use mailgram_models::ProcessingRecord;

use crate::error::{ClassifierError, Result};
use crate::transport::ChatTransport;

/// Which stretch of the day a digest covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestPeriod {
    /// Midnight to now.
    Morning,
    /// Noon to now.
    Evening,
    /// The trailing 24 hours.
    Daily,
}

impl DigestPeriod {
    /// Human phrasing used in the prompt and the rendered header.
    pub fn as_phrase(&self) -> &'static str {
        match self {
            DigestPeriod::Morning => "this morning",
            DigestPeriod::Evening => "this evening",
            DigestPeriod::Daily => "the last 24 hours",
        }
    }

    /// The `[start, end]` window for a digest generated at `now`.
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = match self {
            DigestPeriod::Morning => now
                .with_hour(0)
                .and_then(|d| d.with_minute(0))
                .and_then(|d| d.with_second(0))
                .unwrap_or(now),
            DigestPeriod::Evening => now
                .with_hour(12)
                .and_then(|d| d.with_minute(0))
                .and_then(|d| d.with_second(0))
                .unwrap_or(now),
            DigestPeriod::Daily => now - Duration::hours(24),
        };
        (start, now)
    }

    /// Path segment used by the HTTP trigger.
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "morning" => Some(DigestPeriod::Morning),
            "evening" => Some(DigestPeriod::Evening),
            "daily" => Some(DigestPeriod::Daily),
            _ => None,
        }
    }
}

/// Generates a Telegram-HTML digest of the given records.
///
/// Uses the `format_email_summary` tool when the model selects it, and falls
/// back to the plain content otherwise; the digest contract is looser than
/// the per-mail classification one.
pub async fn generate_digest(
    transport: &dyn ChatTransport,
    model: &str,
    records: &[ProcessingRecord],
    period: DigestPeriod,
) -> Result<String> {
    if records.is_empty() {
        return Err(ClassifierError::RequestFailed(
            "no emails found for the specified period".to_string(),
        ));
    }

    let summaries: Vec<Value> = records
        .iter()
        .map(|record| {
            json!({
                "from": record.from,
                "title": record.subject,
                "email": record.mailbox,
                "category": record.classification.as_ref().map(|c| c.category.clone()),
                "summary": record.classification.as_ref().map(|c| c.summary.clone()),
                "importance": record.classification.as_ref().map(|c| c.importance),
                "actionSteps": record.classification.as_ref().map(|c| c.action_steps.clone()),
            })
        })
        .collect();

    let summaries_text = serde_json::to_string_pretty(&summaries)
        .map_err(|e| ClassifierError::RequestFailed(format!("failed to encode summaries: {}", e)))?;

    let body = json!({
        "model": model,
        "messages": [
            {
                "role": "system",
                "content": "You are an AI assistant that analyzes emails and provides structured \
                output with concrete action steps. Your final goal - help the user to manage \
                their inbox more effectively."
            },
            {
                "role": "user",
                "content": format!(
                    "Generate a concise summary of email activity for {period}.\n\
                    Total emails received: {count}\n\n\
                    Email summaries:\n{summaries}\n\n\
                    Please provide:\n\
                    1. A brief overview of the email activity for the period\n\
                    2. Highlight the most important emails or trends (up to 5)\n\
                    3. Summarize any urgent action items if applicable",
                    period = period.as_phrase(),
                    count = records.len(),
                    summaries = summaries_text,
                )
            }
        ],
        "tools": [format_email_summary_tool()],
        "tool_choice": "auto"
    });

    let response = transport.send(body).await?;

    let tool_call = &response["choices"][0]["message"]["tool_calls"][0];
    if tool_call["function"]["name"].as_str() == Some("format_email_summary") {
        if let Some(arguments) = tool_call["function"]["arguments"].as_str() {
            let data: Value = serde_json::from_str(arguments).map_err(|e| {
                ClassifierError::SchemaViolation(format!("digest arguments are not JSON: {}", e))
            })?;
            return Ok(render_digest_html(period, &data));
        }
    }

    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or(ClassifierError::MissingToolCall)
}

fn format_email_summary_tool() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": "format_email_summary",
            "description": "Formats the email summary",
            "parameters": {
                "type": "object",
                "properties": {
                    "overview": {
                        "type": "string",
                        "description": "A brief overview of the email activity for the period"
                    },
                    "importantEmails": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "title": { "type": "string" },
                                "importance": { "type": "number" },
                                "summary": { "type": "string" }
                            }
                        },
                        "description": "A list of important emails with titles, importance ratings and summaries"
                    },
                    "urgentActions": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "A list of urgent action items if applicable"
                    }
                },
                "required": ["overview", "importantEmails"]
            }
        }
    })
}

fn render_digest_html(period: DigestPeriod, data: &Value) -> String {
    let mut out = format!("<b>Email Summary for {}</b>\n\n", period.as_phrase());
    if let Some(overview) = data["overview"].as_str() {
        out.push_str(&format!("<b>Overview</b>\n{}\n\n", overview));
    }

    if let Some(emails) = data["importantEmails"].as_array() {
        if !emails.is_empty() {
            out.push_str("<b>Important Emails</b>\n");
            for email in emails {
                out.push_str(&format!(
                    "• <b>{}</b> (Importance: {})\n  {}\n\n",
                    email["title"].as_str().unwrap_or(""),
                    email["importance"].as_u64().unwrap_or(0),
                    email["summary"].as_str().unwrap_or(""),
                ));
            }
        }
    }

    if let Some(actions) = data["urgentActions"].as_array() {
        if !actions.is_empty() {
            out.push_str("<b>Urgent Actions</b>\n");
            for action in actions {
                if let Some(action) = action.as_str() {
                    out.push_str(&format!("• {}\n", action));
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailgram_models::{Classification, SkipUpdate};

    struct CannedTransport(Value);

    #[async_trait]
    impl ChatTransport for CannedTransport {
        async fn send(&self, _body: Value) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    fn record() -> ProcessingRecord {
        let mut record = ProcessingRecord::new("u@x.com", "m1");
        record.from = Some("boss@corp.com".to_string());
        record.subject = Some("Report".to_string());
        record.apply_skip(SkipUpdate::with_classification(
            "Email is not important",
            Classification {
                category: "Work".to_string(),
                summary: "Report due".to_string(),
                importance: 4,
                deadline: None,
                action_steps: vec![],
                important_urls: vec![],
            },
        ));
        record
    }

    #[test]
    fn test_period_bounds_daily() {
        let now = Utc::now();
        let (start, end) = DigestPeriod::Daily.bounds(now);
        assert_eq!(end, now);
        assert_eq!(end - start, Duration::hours(24));
    }

    #[test]
    fn test_period_from_slug() {
        assert_eq!(DigestPeriod::from_slug("morning"), Some(DigestPeriod::Morning));
        assert_eq!(DigestPeriod::from_slug("nope"), None);
    }

    #[tokio::test]
    async fn test_digest_renders_tool_output() {
        let transport = CannedTransport(json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "function": {
                            "name": "format_email_summary",
                            "arguments": "{\"overview\":\"Quiet day\",\"importantEmails\":[{\"title\":\"Report\",\"importance\":4,\"summary\":\"Report due\"}],\"urgentActions\":[\"Reply to boss\"]}"
                        }
                    }]
                }
            }]
        }));

        let html = generate_digest(&transport, "gpt-4o-mini", &[record()], DigestPeriod::Daily)
            .await
            .unwrap();
        assert!(html.contains("Quiet day"));
        assert!(html.contains("<b>Report</b>"));
        assert!(html.contains("Reply to boss"));
    }

    #[tokio::test]
    async fn test_digest_falls_back_to_content() {
        let transport = CannedTransport(json!({
            "choices": [{"message": {"content": "Plain summary"}}]
        }));

        let html = generate_digest(&transport, "gpt-4o-mini", &[record()], DigestPeriod::Morning)
            .await
            .unwrap();
        assert_eq!(html, "Plain summary");
    }

    #[tokio::test]
    async fn test_digest_empty_records_is_error() {
        let transport = CannedTransport(json!({}));
        let result =
            generate_digest(&transport, "gpt-4o-mini", &[], DigestPeriod::Morning).await;
        assert!(result.is_err());
    }
}
