/**
 * Room Chat Message Types
 *
 * `Message` is the fully hydrated view sent to clients: the stored row
 * joined with its author's display data, attachment URLs and reactions.
 * `NewMessage` and `ReactionToggle` are the write-side items that travel
 * through the buffered writers before they reach the tenant database.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One user's reaction on a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: Uuid,
    pub emoji: String,
}

/// Room chat message as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    /// Author display name
    #[serde(default)]
    pub full_name: String,
    /// Author avatar URL
    #[serde(default)]
    pub avatar: String,
    pub message: String,
    /// Attachment URLs
    #[serde(default)]
    pub content_url: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

/// A message waiting in the buffered writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    /// Build the client-facing view broadcast before the row is flushed
    pub fn to_view(&self, full_name: String, avatar: String, content_url: Vec<String>) -> Message {
        Message {
            id: self.id,
            user_id: self.user_id,
            room_id: self.room_id,
            full_name,
            avatar,
            message: self.message.clone(),
            content_url,
            created_at: self.created_at,
            edited_at: None,
            reactions: Vec::new(),
        }
    }
}

/// A reaction click waiting in the buffered writer
///
/// Applying it toggles: the same emoji removes the reaction, a different
/// emoji replaces it, and no prior reaction inserts one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionToggle {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
}
