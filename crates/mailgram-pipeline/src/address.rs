//! Sender-address extraction from raw mail headers.

use regex::Regex;

use mailgram_models::normalize_mailbox;

/// Pulls the bare address out of a raw `From` header.
///
/// Tolerates display-name wrapping (`"Jane Doe" <jane@x.com>`) and bare
/// addresses alike; the result is normalized lowercase. Returns `None` when
/// nothing address-shaped is present.
pub fn extract_address(header: &str) -> Option<String> {
    let re = Regex::new(r"(?i)<?[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}>?").unwrap();
    re.find(header)
        .map(|m| normalize_mailbox(&m.as_str().replace(['<', '>'], "")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_address() {
        assert_eq!(
            extract_address("jane@example.com").as_deref(),
            Some("jane@example.com")
        );
    }

    #[test]
    fn test_display_name_wrapping() {
        assert_eq!(
            extract_address("\"Jane Doe\" <Jane@Example.com>").as_deref(),
            Some("jane@example.com")
        );
        assert_eq!(
            extract_address("Jane Doe <jane.doe+tag@mail.example.co.uk>").as_deref(),
            Some("jane.doe+tag@mail.example.co.uk")
        );
    }

    #[test]
    fn test_no_address() {
        assert_eq!(extract_address("not an address"), None);
        assert_eq!(extract_address(""), None);
    }
}
