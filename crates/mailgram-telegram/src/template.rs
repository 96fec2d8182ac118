//! Message rendering: the notification template and its button layout.

use mailgram_models::{Classification, NormalizedMail};

/// A button in the rendered layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    /// Callback button carrying encoded callback data.
    Callback { label: String, data: String },
    /// Link button opening a URL.
    Url { label: String, url: String },
}

impl Button {
    /// Label + payload pair as stored in the delivery snapshot.
    pub fn as_snapshot_pair(&self) -> (String, String) {
        match self {
            Button::Callback { label, data } => (label.clone(), data.clone()),
            Button::Url { label, url } => (label.clone(), url.clone()),
        }
    }
}

/// Emoji and label for an importance level.
pub fn importance_info(importance: u8) -> (&'static str, &'static str) {
    match importance {
        1 => ("⚪️", "Low importance"),
        2 => ("🔵", "Moderate importance"),
        3 => ("🟢", "Important"),
        4 => ("🟠", "Very important"),
        5 => ("🔴", "Urgent"),
        _ => ("", ""),
    }
}

/// Escapes text for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Whether a URL is acceptable for a button: parseable, http(s) scheme.
pub fn is_valid_url(candidate: &str) -> bool {
    url::Url::parse(candidate)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Renders the notification text for one classified mail.
pub fn render_message(mail: &NormalizedMail, mailbox: &str, classification: &Classification) -> String {
    let (emoji, importance_text) = importance_info(classification.importance);

    let deadline_line = classification
        .deadline
        .as_deref()
        .map(|deadline| format!("<b>Deadline/Time of Event:</b> {}\n", escape_html(deadline)))
        .unwrap_or_default();

    let actions = if classification.action_steps.is_empty() {
        String::new()
    } else {
        let steps = classification
            .action_steps
            .iter()
            .enumerate()
            .map(|(index, step)| format!("{}. {}", index + 1, escape_html(step)))
            .collect::<Vec<_>>()
            .join("\n");
        format!("\n<b>Recommended Actions:</b>\n{}", steps)
    };

    format!(
        "{emoji} ✉️ <b>{from}</b> for <b>{mailbox}</b> (<i>{importance}/5, {importance_text}</i>)\n\
        <b>{title}</b>\n\
        <b>Category:</b> {category}\n\
        {deadline_line}\
        {summary}\n\
        {actions}",
        emoji = emoji,
        from = escape_html(&mail.from),
        mailbox = mailbox,
        importance = classification.importance,
        importance_text = importance_text,
        title = escape_html(&mail.subject),
        category = escape_html(&classification.category),
        deadline_line = deadline_line,
        summary = escape_html(&classification.summary),
        actions = actions,
    )
    .trim_end()
    .to_string()
}

/// Builds the action-button layout for one classified mail.
///
/// Row one is always Blacklist / Remove / Show more; an Unsubscribe row and
/// up to five important-link rows follow, each URL admitted only after
/// scheme validation.
pub fn build_buttons(
    message_id: &str,
    unsubscribe_url: Option<&str>,
    classification: &Classification,
) -> Vec<Vec<Button>> {
    let mut rows = vec![vec![
        Button::Callback {
            label: "🚫 Blacklist".to_string(),
            data: format!("blacklist:{}", message_id),
        },
        Button::Callback {
            label: "🗑 Remove".to_string(),
            data: format!("remove:{}", message_id),
        },
        Button::Callback {
            label: "🔍 Show more".to_string(),
            data: format!("full:{}", message_id),
        },
    ]];

    if let Some(unsubscribe) = unsubscribe_url {
        if is_valid_url(unsubscribe) {
            rows.push(vec![Button::Url {
                label: "🔇 Unsubscribe".to_string(),
                url: unsubscribe.to_string(),
            }]);
        }
    }

    for important in classification.important_urls.iter().take(5) {
        if !is_valid_url(&important.url) {
            continue;
        }
        let label = if important.text.is_empty() {
            "Open link".to_string()
        } else {
            important.text.clone()
        };
        rows.push(vec![Button::Url {
            label: format!("🔗 {}", label),
            url: important.url.clone(),
        }]);
    }

    rows
}
