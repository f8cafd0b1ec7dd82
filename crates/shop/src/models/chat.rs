//! Support chat records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use buildmart_core::{ConversationId, ConversationStatus, MessageId, SenderRole, UserId};

use super::{ValidationError, required_text};

/// Maximum message body length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4_000;
const MAX_SUBJECT_LENGTH: usize = 200;
const PREVIEW_LENGTH: usize = 120;

/// A support conversation between one customer and the store's staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub customer_id: UserId,
    pub customer_name: String,
    pub subject: String,
    pub status: ConversationStatus,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Conversation list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message_preview: Option<String>,
    /// Messages from the other side not yet read by the viewer.
    pub unread_count: i64,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub sender_role: SenderRole,
    pub sender_name: String,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Whether a user was seen recently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub user_id: UserId,
    pub online: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// Staff conversation list filter.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ConversationFilter {
    pub status: Option<ConversationStatus>,
    /// Only conversations with unread customer messages.
    pub unread: bool,
}

/// Validate a message body.
///
/// # Errors
///
/// Returns `ValidationError` for a blank body or one over
/// [`MAX_MESSAGE_LENGTH`] characters.
pub fn validate_body(body: &str) -> Result<String, ValidationError> {
    required_text(body, "Message", MAX_MESSAGE_LENGTH)
}

/// Validate a conversation subject.
///
/// # Errors
///
/// Returns `ValidationError` for a blank or oversized subject.
pub fn validate_subject(subject: &str) -> Result<String, ValidationError> {
    required_text(subject, "Subject", MAX_SUBJECT_LENGTH)
}

/// Shorten a message for list previews, on a character boundary.
#[must_use]
pub fn preview(body: &str) -> String {
    if body.chars().count() <= PREVIEW_LENGTH {
        return body.to_owned();
    }
    let mut short: String = body.chars().take(PREVIEW_LENGTH - 1).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_body_limits() {
        assert!(validate_body("  ").is_err());
        assert!(validate_body(&"a".repeat(MAX_MESSAGE_LENGTH)).is_ok());
        assert!(validate_body(&"a".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
        // Counted in characters, not bytes.
        assert!(validate_body(&"é".repeat(MAX_MESSAGE_LENGTH)).is_ok());
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short"), "short");
        let long = "ü".repeat(500);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_LENGTH);
        assert!(p.ends_with('…'));
    }
}
