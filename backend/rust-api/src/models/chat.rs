use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::bson_datetime_as_chrono;

/// Direct message between a student and an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub body: String,
    #[serde(with = "bson_datetime_as_chrono")]
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[validate(length(min = 1, message = "recipientId must not be empty"))]
    pub recipient_id: String,
    #[validate(length(min = 1, max = 4000, message = "body must be 1..=4000 chars"))]
    pub body: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    /// Counterpart user id; the conversation covers both directions.
    pub with: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub with_user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read: bool,
}

impl From<ChatMessage> for MessageResponse {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id,
            sender_id: m.sender_id,
            recipient_id: m.recipient_id,
            body: m.body,
            sent_at: m.sent_at,
            read: m.read,
        }
    }
}

/// Unread message count per counterpart sender.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub sender_id: String,
    pub count: u64,
}
