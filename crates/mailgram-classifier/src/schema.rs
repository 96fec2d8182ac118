//! The `analyze_email` tool schema and its strict response validation.

use mailgram_models::{Classification, ImportantUrl};
use serde_json::{json, Value};

use crate::error::{ClassifierError, Result};

/// Upper bound on action steps and important URLs kept from a response.
pub const MAX_LIST_ITEMS: usize = 5;

/// Tool definition sent with every classification request.
pub fn analyze_email_tool() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": "analyze_email",
            "description": "Analyzes an email and returns structured information about it",
            "parameters": {
                "type": "object",
                "properties": {
                    "category": {
                        "type": "string",
                        "description": "The category of the email"
                    },
                    "summary": {
                        "type": "string",
                        "description": "A brief summary of the email content"
                    },
                    "importance": {
                        "type": "number",
                        "description": "The importance rating of the email from 0 to 5"
                    },
                    "deadline": {
                        "type": "string",
                        "description": "The deadline OR time of the event from email, if applicable. Return in format: HH:mm, DD/MM/YYYY OR DD/MM/YYYY. Do not convert time zones, just extract the data from the email. Empty if not applicable"
                    },
                    "actionSteps": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "List of concrete action steps based on the email content, with deadlines if applicable. Ignore if useless in this case! IMPORTANT: Max 5 items, empty if not applicable"
                    },
                    "importantUrls": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "url": { "type": "string" },
                                "text": { "type": "string" }
                            },
                            "required": ["url", "text"]
                        },
                        "description": "If email contains special URL to follow (confirmation, etc), extract them (+text to display for the link) and provide here. Extract full links, not just domains! IMPORTANT: Max 5 items, empty if not applicable"
                    }
                },
                "required": ["category", "summary", "importance"]
            }
        }
    })
}

/// Validates the tool-call arguments against the contract.
///
/// Missing required fields and out-of-range importance are hard failures;
/// optional lists are clamped to [`MAX_LIST_ITEMS`].
pub fn parse_classification(arguments: &str) -> Result<Classification> {
    let value: Value = serde_json::from_str(arguments)
        .map_err(|e| ClassifierError::SchemaViolation(format!("arguments are not JSON: {}", e)))?;

    let category = required_string(&value, "category")?;
    let summary = required_string(&value, "summary")?;

    let importance = value
        .get("importance")
        .and_then(Value::as_f64)
        .ok_or_else(|| missing("importance"))?;
    if importance.fract() != 0.0 || !(0.0..=5.0).contains(&importance) {
        return Err(ClassifierError::SchemaViolation(format!(
            "importance out of range: {}",
            importance
        )));
    }

    let deadline = value
        .get("deadline")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let action_steps = value
        .get("actionSteps")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .take(MAX_LIST_ITEMS)
                .collect()
        })
        .unwrap_or_default();

    let important_urls = value
        .get("importantUrls")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let url = item.get("url")?.as_str()?.to_string();
                    let text = item
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or("Open link")
                        .to_string();
                    Some(ImportantUrl { url, text })
                })
                .take(MAX_LIST_ITEMS)
                .collect()
        })
        .unwrap_or_default();

    Ok(Classification {
        category,
        summary,
        importance: importance as u8,
        deadline,
        action_steps,
        important_urls,
    })
}

fn required_string(value: &Value, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing(field))
}

fn missing(field: &str) -> ClassifierError {
    ClassifierError::SchemaViolation(format!("missing required field: {}", field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let parsed = parse_classification(
            r#"{"category":"Marketing","summary":"Weekly deals","importance":0}"#,
        )
        .unwrap();
        assert_eq!(parsed.category, "Marketing");
        assert_eq!(parsed.importance, 0);
        assert!(parsed.deadline.is_none());
        assert!(parsed.action_steps.is_empty());
    }

    #[test]
    fn test_parse_full() {
        let parsed = parse_classification(
            r#"{
                "category": "Work",
                "summary": "Project review moved",
                "importance": 5,
                "deadline": "18:00, 05/09/2025",
                "actionSteps": ["Reply by 6pm"],
                "importantUrls": [{"url": "https://cal.example.com/ev", "text": "Event"}]
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.importance, 5);
        assert_eq!(parsed.deadline.as_deref(), Some("18:00, 05/09/2025"));
        assert_eq!(parsed.action_steps, vec!["Reply by 6pm"]);
        assert_eq!(parsed.important_urls[0].url, "https://cal.example.com/ev");
    }

    #[test]
    fn test_missing_required_field_is_hard_failure() {
        let result = parse_classification(r#"{"category":"Work","importance":3}"#);
        assert!(matches!(result, Err(ClassifierError::SchemaViolation(_))));
    }

    #[test]
    fn test_importance_out_of_range() {
        let result =
            parse_classification(r#"{"category":"Work","summary":"s","importance":6}"#);
        assert!(matches!(result, Err(ClassifierError::SchemaViolation(_))));

        let result =
            parse_classification(r#"{"category":"Work","summary":"s","importance":2.5}"#);
        assert!(matches!(result, Err(ClassifierError::SchemaViolation(_))));
    }

    #[test]
    fn test_empty_deadline_is_none() {
        let parsed = parse_classification(
            r#"{"category":"Work","summary":"s","importance":3,"deadline":"  "}"#,
        )
        .unwrap();
        assert!(parsed.deadline.is_none());
    }

    #[test]
    fn test_lists_clamped_to_five() {
        let steps: Vec<String> = (0..8).map(|i| format!("\"step {}\"", i)).collect();
        let raw = format!(
            r#"{{"category":"Work","summary":"s","importance":3,"actionSteps":[{}]}}"#,
            steps.join(",")
        );
        let parsed = parse_classification(&raw).unwrap();
        assert_eq!(parsed.action_steps.len(), MAX_LIST_ITEMS);
    }

    #[test]
    fn test_not_json_is_hard_failure() {
        assert!(matches!(
            parse_classification("not json"),
            Err(ClassifierError::SchemaViolation(_))
        ));
    }
}
