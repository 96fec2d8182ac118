//! Callback-data codec for notification buttons.
//!
//! Button presses come back from the chat as opaque strings; decoding them
//! into a tagged command exactly once at this boundary means malformed
//! tokens surface as errors instead of silent no-ops.

use thiserror::Error;

/// A decoded button command. The payload is the provider message id of the
/// mail the button belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackCommand {
    /// Add the sender to the blacklist.
    Blacklist(String),
    /// Delete the mail from the mailbox.
    Remove(String),
    /// Expand the full mail text.
    ShowFull(String),
}

/// Errors decoding callback data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallbackParseError {
    #[error("callback data has no action prefix: {0}")]
    MissingPrefix(String),
    #[error("unknown callback action: {0}")]
    UnknownAction(String),
    #[error("callback data has an empty payload")]
    EmptyPayload,
}

impl CallbackCommand {
    /// Decodes `action:payload` callback data.
    pub fn parse(data: &str) -> Result<Self, CallbackParseError> {
        let (action, payload) = data
            .split_once(':')
            .ok_or_else(|| CallbackParseError::MissingPrefix(data.to_string()))?;
        if payload.is_empty() {
            return Err(CallbackParseError::EmptyPayload);
        }
        match action {
            "blacklist" => Ok(CallbackCommand::Blacklist(payload.to_string())),
            "remove" => Ok(CallbackCommand::Remove(payload.to_string())),
            "full" => Ok(CallbackCommand::ShowFull(payload.to_string())),
            other => Err(CallbackParseError::UnknownAction(other.to_string())),
        }
    }

    /// Encodes the command back into callback data.
    pub fn encode(&self) -> String {
        match self {
            CallbackCommand::Blacklist(id) => format!("blacklist:{}", id),
            CallbackCommand::Remove(id) => format!("remove:{}", id),
            CallbackCommand::ShowFull(id) => format!("full:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_actions() {
        assert_eq!(
            CallbackCommand::parse("blacklist:m1"),
            Ok(CallbackCommand::Blacklist("m1".to_string()))
        );
        assert_eq!(
            CallbackCommand::parse("remove:m1"),
            Ok(CallbackCommand::Remove("m1".to_string()))
        );
        assert_eq!(
            CallbackCommand::parse("full:m1"),
            Ok(CallbackCommand::ShowFull("m1".to_string()))
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            CallbackCommand::parse("nonsense"),
            Err(CallbackParseError::MissingPrefix(_))
        ));
        assert!(matches!(
            CallbackCommand::parse("archive:m1"),
            Err(CallbackParseError::UnknownAction(_))
        ));
        assert_eq!(
            CallbackCommand::parse("remove:"),
            Err(CallbackParseError::EmptyPayload)
        );
    }

    #[test]
    fn test_roundtrip() {
        for data in ["blacklist:abc", "remove:abc", "full:abc"] {
            assert_eq!(CallbackCommand::parse(data).unwrap().encode(), data);
        }
    }

    #[test]
    fn test_payload_with_colon_survives() {
        // Provider ids may themselves contain separators.
        let command = CallbackCommand::parse("full:a:b").unwrap();
        assert_eq!(command, CallbackCommand::ShowFull("a:b".to_string()));
    }
}
