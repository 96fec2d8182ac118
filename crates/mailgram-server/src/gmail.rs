//! Gmail REST implementation of the mailbox gateway.
//!
//! Talks to the Gmail API with the mailbox's stored bearer token:
//! `history.list` for message ids added since the checkpoint,
//! `messages.get` for full payloads, `attachments.get` for attachment
//! bodies, `watch` for push-subscription renewal and `getProfile` as the
//! credentials probe.

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use mailgram_models::{Attachment, LinkedMailbox, NormalizedMail};
use mailgram_pipeline::{GatewayError, MailboxGateway};

const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail-backed mailbox gateway.
pub struct GmailGateway {
    client: reqwest::Client,
    topic: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    history: Option<Vec<HistoryEntry>>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry {
    messages_added: Option<Vec<MessageAdded>>,
}

#[derive(Debug, Deserialize)]
struct MessageAdded {
    message: MessageRef,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    snippet: Option<String>,
    payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    mime_type: Option<String>,
    filename: Option<String>,
    headers: Option<Vec<Header>>,
    body: Option<PartBody>,
    parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartBody {
    data: Option<String>,
    attachment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WatchResponse {
    history_id: String,
}

#[derive(Debug, Deserialize)]
struct AttachmentResponse {
    data: Option<String>,
}

impl GmailGateway {
    /// Creates a gateway publishing watch notifications to `topic`.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            topic: topic.into(),
        }
    }

    async fn list_added_ids(
        &self,
        token: &str,
        checkpoint: u64,
    ) -> Result<Vec<String>, GatewayError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/history?labelId=INBOX&startHistoryId={}",
                API_BASE, checkpoint
            );
            if let Some(ref page) = page_token {
                url.push_str(&format!("&pageToken={}", page));
            }

            let response = self
                .client
                .get(&url)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| GatewayError::FetchFailed(e.to_string()))?;
            if !response.status().is_success() {
                return Err(GatewayError::FetchFailed(format!(
                    "history.list returned {}",
                    response.status()
                )));
            }

            let history: HistoryResponse = response
                .json()
                .await
                .map_err(|e| GatewayError::FetchFailed(e.to_string()))?;

            for entry in history.history.unwrap_or_default() {
                for added in entry.messages_added.unwrap_or_default() {
                    ids.push(added.message.id);
                }
            }

            match history.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }

    async fn get_message(&self, token: &str, id: &str) -> Result<GmailMessage, GatewayError> {
        let url = format!("{}/messages/{}?format=FULL", API_BASE, id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| GatewayError::FetchFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::FetchFailed(format!(
                "messages.get returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::FetchFailed(e.to_string()))
    }

    async fn get_attachment(
        &self,
        token: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, GatewayError> {
        let url = format!(
            "{}/messages/{}/attachments/{}",
            API_BASE, message_id, attachment_id
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| GatewayError::FetchFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::FetchFailed(format!(
                "attachments.get returned {}",
                response.status()
            )));
        }
        let attachment: AttachmentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::FetchFailed(e.to_string()))?;
        attachment
            .data
            .as_deref()
            .and_then(decode_base64url)
            .ok_or_else(|| GatewayError::FetchFailed("attachment body missing".to_string()))
    }

    async fn normalize(
        &self,
        token: &str,
        message: GmailMessage,
    ) -> Result<NormalizedMail, GatewayError> {
        let payload = message.payload.as_ref();

        let from = payload
            .and_then(|p| header_value(p, "From"))
            .unwrap_or_default();
        let subject = payload
            .and_then(|p| header_value(p, "Subject"))
            .unwrap_or_default();
        let date = payload
            .and_then(|p| header_value(p, "Date"))
            .and_then(|raw| parse_mail_date(&raw));
        let unsubscribe_url = payload
            .and_then(|p| header_value(p, "List-Unsubscribe"))
            .and_then(|raw| extract_unsubscribe_url(&raw));

        let snippet = message.snippet.clone().unwrap_or_default();
        let body = payload.map(extract_text).unwrap_or_default();
        let body = if body.is_empty() { snippet.clone() } else { body };

        let mut attachments = Vec::new();
        if let Some(payload) = payload {
            for part in attachment_parts(payload) {
                let name = part.filename.clone().unwrap_or_default();
                let data = match part.body.as_ref() {
                    Some(body) => match body.data.as_deref().and_then(decode_base64url) {
                        Some(data) => data,
                        None => match body.attachment_id.as_deref() {
                            Some(attachment_id) => {
                                self.get_attachment(token, &message.id, attachment_id).await?
                            }
                            None => continue,
                        },
                    },
                    None => continue,
                };
                attachments.push(Attachment { name, data });
            }
        }

        Ok(NormalizedMail {
            id: message.id,
            from,
            subject,
            body,
            snippet,
            unsubscribe_url,
            attachments,
            date,
        })
    }
}

#[async_trait]
impl MailboxGateway for GmailGateway {
    async fn fetch_since(
        &self,
        mailbox: &LinkedMailbox,
    ) -> Result<Vec<NormalizedMail>, GatewayError> {
        let token = &mailbox.credentials;
        let ids = self.list_added_ids(token, mailbox.checkpoint).await?;

        let mut mails = Vec::new();
        for id in ids {
            match self.get_message(token, &id).await {
                Ok(message) => mails.push(self.normalize(token, message).await?),
                Err(e) => {
                    // One unreadable message must not sink the batch.
                    warn!(message_id = %id, error = %e, "Skipping unreadable message");
                }
            }
        }
        Ok(mails)
    }

    async fn check_authorization(&self, mailbox: &LinkedMailbox) -> Result<(), GatewayError> {
        let response = self
            .client
            .get(format!("{}/profile", API_BASE))
            .bearer_auth(&mailbox.credentials)
            .send()
            .await
            .map_err(|e| GatewayError::Unauthorized(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::Unauthorized(format!(
                "profile returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn renew_watch(&self, mailbox: &LinkedMailbox) -> Result<u64, GatewayError> {
        let response = self
            .client
            .post(format!("{}/watch", API_BASE))
            .bearer_auth(&mailbox.credentials)
            .json(&json!({
                "topicName": self.topic,
                "labelIds": ["INBOX"],
            }))
            .send()
            .await
            .map_err(|e| GatewayError::WatchFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::WatchFailed(format!(
                "watch returned {}",
                response.status()
            )));
        }
        let watch: WatchResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::WatchFailed(e.to_string()))?;
        watch
            .history_id
            .parse()
            .map_err(|_| GatewayError::WatchFailed("watch returned a non-numeric history id".to_string()))
    }
}

/// Decodes Gmail's base64url body data, padded or not.
fn decode_base64url(data: &str) -> Option<Vec<u8>> {
    base64::engine::general_purpose::URL_SAFE
        .decode(data)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(data))
        .ok()
}

fn header_value(part: &MessagePart, name: &str) -> Option<String> {
    part.headers
        .as_ref()?
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

fn parse_mail_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// First angle-bracketed URL of a `List-Unsubscribe` header.
fn extract_unsubscribe_url(header: &str) -> Option<String> {
    let re = Regex::new(r"<(https?://[^>]+)>").unwrap();
    re.captures(header)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Collects the message text, preferring text/plain parts and falling back
/// to stripped text/html.
fn extract_text(payload: &MessagePart) -> String {
    let mut plain = Vec::new();
    let mut html = Vec::new();
    collect_text_parts(payload, &mut plain, &mut html);

    if !plain.is_empty() {
        plain.join("\n")
    } else if !html.is_empty() {
        html.iter().map(|h| html_to_text(h)).collect::<Vec<_>>().join("\n")
    } else {
        String::new()
    }
}

fn collect_text_parts(part: &MessagePart, plain: &mut Vec<String>, html: &mut Vec<String>) {
    let mime = part.mime_type.as_deref().unwrap_or("");
    let is_attachment = part.filename.as_deref().is_some_and(|f| !f.is_empty());

    if !is_attachment {
        if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
            if let Some(decoded) = decode_base64url(data) {
                let text = String::from_utf8_lossy(&decoded).to_string();
                if mime.contains("text/html") {
                    html.push(text);
                } else if mime.contains("text/plain") || mime.is_empty() {
                    plain.push(text);
                }
            }
        }
    }

    for sub in part.parts.as_deref().unwrap_or_default() {
        collect_text_parts(sub, plain, html);
    }
}

/// Parts carrying an attachment (non-empty filename), depth first.
fn attachment_parts(payload: &MessagePart) -> Vec<&MessagePart> {
    let mut found = Vec::new();
    collect_attachment_parts(payload, &mut found);
    found
}

fn collect_attachment_parts<'a>(part: &'a MessagePart, found: &mut Vec<&'a MessagePart>) {
    if part.filename.as_deref().is_some_and(|f| !f.is_empty()) {
        found.push(part);
    }
    for sub in part.parts.as_deref().unwrap_or_default() {
        collect_attachment_parts(sub, found);
    }
}

/// Converts minimal HTML to plain text.
fn html_to_text(html: &str) -> String {
    let mut text = Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>")
        .unwrap()
        .replace_all(html, "")
        .to_string();
    text = Regex::new(r"(?i)<br\s*/?>")
        .unwrap()
        .replace_all(&text, "\n")
        .to_string();
    text = Regex::new(r"(?i)</p>")
        .unwrap()
        .replace_all(&text, "\n")
        .to_string();
    text = Regex::new(r"<[^>]+>")
        .unwrap()
        .replace_all(&text, "")
        .to_string();
    text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(text: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(text)
    }

    #[test]
    fn test_decode_base64url_with_and_without_padding() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode("hi");
        let unpadded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode("hi");
        assert_eq!(decode_base64url(&padded).unwrap(), b"hi");
        assert_eq!(decode_base64url(&unpadded).unwrap(), b"hi");
        assert!(decode_base64url("!!!").is_none());
    }

    #[test]
    fn test_extract_unsubscribe_url() {
        assert_eq!(
            extract_unsubscribe_url("<https://news.example.com/unsub?u=1>, <mailto:unsub@x.com>")
                .as_deref(),
            Some("https://news.example.com/unsub?u=1")
        );
        assert_eq!(
            extract_unsubscribe_url("<mailto:unsub@x.com>, <https://x.com/u>").as_deref(),
            Some("https://x.com/u")
        );
        assert!(extract_unsubscribe_url("<mailto:unsub@x.com>").is_none());
    }

    #[test]
    fn test_html_to_text() {
        assert_eq!(html_to_text("Hello<br>World"), "Hello\nWorld");
        assert_eq!(html_to_text("<p>One</p><p>Two</p>"), "One\nTwo");
        assert_eq!(html_to_text("<b>Bold</b> &amp; <i>plain</i>"), "Bold & plain");
        assert_eq!(
            html_to_text("<style>.x{color:red}</style>Visible"),
            "Visible"
        );
    }

    #[test]
    fn test_extract_text_prefers_plain() {
        let payload: MessagePart = serde_json::from_value(serde_json::json!({
            "mimeType": "multipart/alternative",
            "parts": [
                {"mimeType": "text/plain", "body": {"data": b64("plain body")}},
                {"mimeType": "text/html", "body": {"data": b64("<b>html body</b>")}}
            ]
        }))
        .unwrap();
        assert_eq!(extract_text(&payload), "plain body");
    }

    #[test]
    fn test_extract_text_falls_back_to_html() {
        let payload: MessagePart = serde_json::from_value(serde_json::json!({
            "mimeType": "multipart/alternative",
            "parts": [
                {"mimeType": "text/html", "body": {"data": b64("line<br>break")}}
            ]
        }))
        .unwrap();
        assert_eq!(extract_text(&payload), "line\nbreak");
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let payload: MessagePart = serde_json::from_value(serde_json::json!({
            "headers": [
                {"name": "from", "value": "a@x.com"},
                {"name": "Subject", "value": "Hi"}
            ]
        }))
        .unwrap();
        assert_eq!(header_value(&payload, "From").as_deref(), Some("a@x.com"));
        assert_eq!(header_value(&payload, "subject").as_deref(), Some("Hi"));
        assert!(header_value(&payload, "Date").is_none());
    }

    #[test]
    fn test_attachment_parts_found_recursively() {
        let payload: MessagePart = serde_json::from_value(serde_json::json!({
            "mimeType": "multipart/mixed",
            "parts": [
                {"mimeType": "text/plain", "body": {"data": b64("body")}},
                {"mimeType": "application/pdf", "filename": "invoice.pdf",
                 "body": {"attachmentId": "att-1"}},
                {"mimeType": "multipart/related", "parts": [
                    {"mimeType": "image/png", "filename": "logo.png",
                     "body": {"data": b64("png-bytes")}}
                ]}
            ]
        }))
        .unwrap();
        let found = attachment_parts(&payload);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].filename.as_deref(), Some("invoice.pdf"));
        assert_eq!(found[1].filename.as_deref(), Some("logo.png"));
    }

    #[test]
    fn test_parse_mail_date() {
        let parsed = parse_mail_date("Fri, 5 Sep 2025 10:30:00 +0200").unwrap();
        assert_eq!(parsed.to_rfc2822(), "Fri, 5 Sep 2025 08:30:00 +0000");
        assert!(parse_mail_date("not a date").is_none());
    }
}
