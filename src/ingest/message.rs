//! Message types exchanged with the chat client.
//!
//! The chat automation hands over the visible messages as a JSON array:
//!
//! ```json
//! [{"text": "大100", "sender": "Tom", "senderId": "u1234", "isSent": false, "index": 7}]
//! ```

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::ingest::source::SourceError;

/// How many leading chars of the text go into a fingerprint.
const FINGERPRINT_TEXT_CHARS: usize = 100;

/// Texts this long or longer are not chat messages (pasted logs, page chrome).
pub const MAX_TEXT_CHARS: usize = 2000;

/// Emitted content is cut to this many chars.
pub const MAX_CONTENT_CHARS: usize = 1000;

/// Max chars shown when a message is logged.
const PREVIEW_CHARS: usize = 50;

/// A message as currently visible in the chat client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub text: String,
    #[serde(rename = "sender", default)]
    pub sender_name: String,
    #[serde(rename = "senderId", default)]
    pub sender_id: String,
    /// Sent by the bot account itself.
    #[serde(rename = "isSent", default)]
    pub is_self: bool,
    /// Ordinal assigned by the source to the message's slot in the chat view.
    #[serde(rename = "index")]
    pub position_index: u64,
}

impl RawMessage {
    /// Cheap identity used only to suppress duplicates across polls.
    pub fn fingerprint(&self) -> String {
        let head: String = self.text.chars().take(FINGERPRINT_TEXT_CHARS).collect();
        format!("{}_{}", head, self.position_index)
    }

    pub fn is_oversized(&self) -> bool {
        self.text.chars().nth(MAX_TEXT_CHARS - 1).is_some()
    }
}

/// A genuinely new message, emitted once per fingerprint.
#[derive(Debug, Clone)]
pub struct IngestedMessage {
    pub content: String,
    pub sender_name: String,
    pub sender_id: String,
    pub timestamp: DateTime<Local>,
    pub is_self: bool,
    pub is_group: bool,
}

impl IngestedMessage {
    pub fn from_raw(raw: RawMessage) -> Self {
        Self {
            content: raw.text.chars().take(MAX_CONTENT_CHARS).collect(),
            sender_name: raw.sender_name,
            sender_id: raw.sender_id,
            timestamp: Local::now(),
            is_self: raw.is_self,
            is_group: true,
        }
    }

    /// Short form of the content for log lines.
    pub fn preview(&self) -> String {
        let mut preview: String = self.content.chars().take(PREVIEW_CHARS).collect();
        if self.content.chars().count() > PREVIEW_CHARS {
            preview.push_str("...");
        }
        preview
    }
}

/// Parse a JSON snapshot of visible messages.
pub fn parse_snapshot(json: &str) -> Result<Vec<RawMessage>, SourceError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json).map_err(SourceError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str, index: u64) -> RawMessage {
        RawMessage {
            text: text.to_string(),
            sender_name: "Tom".to_string(),
            sender_id: "u1234".to_string(),
            is_self: false,
            position_index: index,
        }
    }

    #[test]
    fn test_fingerprint_format() {
        assert_eq!(raw("大100", 7).fingerprint(), "大100_7");
    }

    #[test]
    fn test_fingerprint_truncates_by_chars() {
        let text = "好".repeat(150);
        let fp = raw(&text, 3).fingerprint();
        assert_eq!(fp, format!("{}_3", "好".repeat(100)));
    }

    #[test]
    fn test_same_text_different_slot() {
        assert_ne!(raw("hi", 1).fingerprint(), raw("hi", 2).fingerprint());
    }

    #[test]
    fn test_parse_snapshot() {
        let json = r#"[
            {"text": "大100", "sender": "Tom", "senderId": "u1234", "isSent": false, "index": 7},
            {"text": "ok", "isSent": true, "index": 8}
        ]"#;
        let messages = parse_snapshot(json).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], raw("大100", 7));
        assert!(messages[1].is_self);
        assert_eq!(messages[1].sender_name, "");
    }

    #[test]
    fn test_parse_snapshot_escapes() {
        let json = r#"[{"text": "line1\nsaid \"hi\"", "index": 0}]"#;
        let messages = parse_snapshot(json).unwrap();
        assert_eq!(messages[0].text, "line1\nsaid \"hi\"");
    }

    #[test]
    fn test_parse_snapshot_empty_input() {
        assert!(parse_snapshot("  ").unwrap().is_empty());
        assert!(parse_snapshot("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_snapshot_rejects_missing_index() {
        let err = parse_snapshot(r#"[{"text": "x"}]"#).unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[test]
    fn test_ingested_preview() {
        let msg = IngestedMessage::from_raw(raw(&"x".repeat(80), 0));
        assert_eq!(msg.preview(), format!("{}...", "x".repeat(50)));
        assert!(msg.is_group);
        assert!(!msg.is_self);

        let short = IngestedMessage::from_raw(raw("hi", 0));
        assert_eq!(short.preview(), "hi");
    }

    #[test]
    fn test_oversized_bound() {
        assert!(!raw(&"好".repeat(MAX_TEXT_CHARS - 1), 0).is_oversized());
        assert!(raw(&"好".repeat(MAX_TEXT_CHARS), 0).is_oversized());
    }

    #[test]
    fn test_content_truncated() {
        let event = IngestedMessage::from_raw(raw(&"好".repeat(1500), 0));
        assert_eq!(event.content.chars().count(), MAX_CONTENT_CHARS);
    }
}
