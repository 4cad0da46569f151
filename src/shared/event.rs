/**
 * Room Chat WebSocket Events
 *
 * Client frames are JSON objects carrying a `type` discriminator. They are
 * decoded once, at the socket boundary, into the closed `RoomEvent` enum.
 * Tags this server does not know decode to `RoomEvent::Unknown` instead of
 * failing, so newer clients can talk to older servers.
 *
 * Server frames are `RoomOutbound`, tagged the same way. The one exception
 * is the history snapshot sent on connect, which is a bare JSON array of
 * messages.
 */
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::SharedError;
use crate::shared::message::{Message, Reaction};

/// Client to server room chat event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    /// Post a message. `id` lets clients pre-assign the identifier of an
    /// optimistic render; the server generates one otherwise.
    NewMessage {
        #[serde(default)]
        id: Option<Uuid>,
        #[serde(default)]
        message: String,
        #[serde(default)]
        content_url: Vec<String>,
        #[serde(default)]
        full_name: String,
        #[serde(default)]
        avatar: String,
    },
    EditMessage {
        id: Uuid,
        message: String,
    },
    DeleteMessage {
        id: Uuid,
    },
    AddReaction {
        message_id: Uuid,
        emoji: String,
    },
    /// Page backwards from `before` (or from the newest message)
    LoadMoreMessages {
        #[serde(default)]
        before: Option<Uuid>,
        #[serde(default)]
        limit: Option<i64>,
    },
    UserTyping,
    /// Re-read and re-broadcast a message, sent after its attachments changed
    UpdateMessage {
        id: Uuid,
    },
    #[serde(other)]
    Unknown,
}

impl RoomEvent {
    /// Decode and validate one text frame
    pub fn decode(frame: &str) -> Result<Self, SharedError> {
        let event: RoomEvent = serde_json::from_str(frame)?;
        match &event {
            RoomEvent::NewMessage { message, content_url, .. }
                if message.trim().is_empty() && content_url.is_empty() =>
            {
                Err(SharedError::validation("message", "message has no text and no attachments"))
            }
            RoomEvent::EditMessage { message, .. } if message.trim().is_empty() => {
                Err(SharedError::validation("message", "edited text cannot be empty"))
            }
            RoomEvent::AddReaction { emoji, .. } if emoji.trim().is_empty() => {
                Err(SharedError::validation("emoji", "emoji cannot be empty"))
            }
            _ => Ok(event),
        }
    }
}

/// Server to client room chat event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomOutbound {
    NewMessage {
        message: Message,
    },
    MessageEdited {
        message: Message,
    },
    MessageUpdated {
        message: Message,
    },
    MessageDeleted {
        id: Uuid,
    },
    /// Full reaction list of a message after a toggle was persisted
    MessageReactionsUpdated {
        message_id: Uuid,
        reactions: Vec<Reaction>,
    },
    /// A toggle that is still buffered; clients apply it locally
    MessageReactionToggled {
        message_id: Uuid,
        user_id: Uuid,
        emoji: String,
    },
    /// Reply to `load_more_messages`, oldest first
    MessagesBatch {
        messages: Vec<Message>,
    },
    UserTyping {
        user_id: Uuid,
        room_id: Uuid,
    },
}
