use crate::error::EventError;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Longest short code a counter row can hold, in characters.
pub const MAX_SHORT_CODE_LEN: usize = 12;

/// A single redirect recorded by a producer and carried on the click queue.
///
/// Wire format (JSON, one event per message body):
///
/// ```json
/// {"short_code": "BukQL", "timestamp": "2024-03-01T12:00:00Z", "user_agent": "curl/8.5.0"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    /// The short code that was resolved.
    pub short_code: String,
    /// When the redirect happened (RFC 3339).
    pub timestamp: Timestamp,
    /// The client's user agent, if it sent one.
    #[serde(default)]
    pub user_agent: String,
}

impl ClickEvent {
    pub fn new(short_code: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            short_code: short_code.into(),
            timestamp: Timestamp::now(),
            user_agent: user_agent.into(),
        }
    }

    /// Decodes a message body into a click event.
    ///
    /// An event whose short code is empty or longer than
    /// [`MAX_SHORT_CODE_LEN`] can never be attributed to a counter and is
    /// treated like any other undecodable payload.
    pub fn from_slice(body: &[u8]) -> Result<Self, EventError> {
        let event: ClickEvent = serde_json::from_slice(body)?;
        if event.short_code.is_empty() {
            return Err(EventError::EmptyShortCode);
        }
        let len = event.short_code.chars().count();
        if len > MAX_SHORT_CODE_LEN {
            return Err(EventError::ShortCodeTooLong {
                len,
                max: MAX_SHORT_CODE_LEN,
            });
        }
        Ok(event)
    }

    /// Encodes the event as a message body.
    pub fn to_vec(&self) -> Result<Vec<u8>, EventError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wire_format() {
        let body = br#"{"short_code":"abc","timestamp":"2024-03-01T12:00:00Z","user_agent":"curl/8.5.0"}"#;
        let event = ClickEvent::from_slice(body).unwrap();

        assert_eq!(event.short_code, "abc");
        assert_eq!(event.user_agent, "curl/8.5.0");
        assert_eq!(
            event.timestamp,
            "2024-03-01T12:00:00Z".parse::<Timestamp>().unwrap()
        );
    }

    #[test]
    fn accepts_offsets_and_fractional_seconds() {
        let body = br#"{"short_code":"abc","timestamp":"2024-03-01T20:00:00.123456789+08:00","user_agent":""}"#;
        let event = ClickEvent::from_slice(body).unwrap();
        assert_eq!(event.timestamp.as_second(), 1_709_294_400);
    }

    #[test]
    fn missing_user_agent_defaults_to_empty() {
        let body = br#"{"short_code":"abc","timestamp":"2024-03-01T12:00:00Z"}"#;
        let event = ClickEvent::from_slice(body).unwrap();
        assert!(event.user_agent.is_empty());
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(
            ClickEvent::from_slice(b"not json"),
            Err(EventError::Malformed(_))
        ));
        assert!(matches!(
            ClickEvent::from_slice(br#"{"short_code":"abc"}"#),
            Err(EventError::Malformed(_))
        ));
        assert!(matches!(
            ClickEvent::from_slice(br#"{"short_code":"abc","timestamp":"yesterday"}"#),
            Err(EventError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_empty_short_code() {
        let body = br#"{"short_code":"","timestamp":"2024-03-01T12:00:00Z"}"#;
        assert!(matches!(
            ClickEvent::from_slice(body),
            Err(EventError::EmptyShortCode)
        ));
    }

    #[test]
    fn rejects_short_codes_that_do_not_fit_a_counter() {
        let body = br#"{"short_code":"aaaaaaaaaaaaaaaaaaaaaaaaa","timestamp":"2024-03-01T12:00:00Z"}"#;
        assert!(matches!(
            ClickEvent::from_slice(body),
            Err(EventError::ShortCodeTooLong { len: 25, max: 12 })
        ));
    }

    #[test]
    fn accepts_short_codes_up_to_the_limit() {
        // u64::MAX encodes to 11 characters, so every generated code fits
        let longest = crate::ShortCodeBase58::from_id(u64::MAX);
        let event = ClickEvent::new(longest.as_str(), "");
        assert!(ClickEvent::from_slice(&event.to_vec().unwrap()).is_ok());

        let twelve = ClickEvent::new("é".repeat(MAX_SHORT_CODE_LEN), "");
        assert!(ClickEvent::from_slice(&twelve.to_vec().unwrap()).is_ok());
    }

    #[test]
    fn encoded_event_decodes_to_itself() {
        let event = ClickEvent::new("xyz", "Mozilla/5.0");
        let decoded = ClickEvent::from_slice(&event.to_vec().unwrap()).unwrap();
        assert_eq!(decoded, event);
    }
}
