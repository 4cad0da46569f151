//! Direct Chat WebSocket Events
//!
//! Same framing as room chat: JSON objects tagged by `type`, decoded once
//! into `DirectEvent`, with `Unknown` catching tags this server does not
//! handle. Peers are addressed by user id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::DirectMessage;
use crate::shared::error::SharedError;

/// Client to server direct chat event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectEvent {
    NewMessage {
        to: Uuid,
        text: String,
    },
    EditMessage {
        id: Uuid,
        text: String,
    },
    DeleteMessage {
        id: Uuid,
    },
    /// Page backwards through the conversation with `with`
    LoadMoreMessages {
        with: Uuid,
        #[serde(default)]
        before: Option<Uuid>,
        #[serde(default)]
        limit: Option<i64>,
    },
    UserTyping {
        to: Uuid,
    },
    MarkRead {
        to: Uuid,
        message_id: Uuid,
    },
    #[serde(other)]
    Unknown,
}

impl DirectEvent {
    /// Decode and validate one text frame sent by `sender`
    pub fn decode(frame: &str, sender: Uuid) -> Result<Self, SharedError> {
        let event: DirectEvent = serde_json::from_str(frame)?;
        match &event {
            DirectEvent::NewMessage { text, .. } | DirectEvent::EditMessage { text, .. }
                if text.trim().is_empty() =>
            {
                Err(SharedError::validation("text", "message text cannot be empty"))
            }
            DirectEvent::NewMessage { to, .. }
            | DirectEvent::UserTyping { to }
            | DirectEvent::MarkRead { to, .. }
                if *to == sender =>
            {
                Err(SharedError::validation("to", "cannot address yourself"))
            }
            DirectEvent::LoadMoreMessages { with, .. } if *with == sender => {
                Err(SharedError::validation("with", "cannot address yourself"))
            }
            _ => Ok(event),
        }
    }
}

/// Server to client direct chat event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectOutbound {
    NewMessage {
        message: DirectMessage,
    },
    MessageEdited {
        message: DirectMessage,
    },
    MessageDeleted {
        id: Uuid,
        conversation_id: Uuid,
    },
    /// Reply to `load_more_messages`, oldest first
    MessagesBatch {
        with: Uuid,
        messages: Vec<DirectMessage>,
    },
    UserTyping {
        from: Uuid,
    },
    MessageRead {
        from: Uuid,
        message_id: Uuid,
    },
}
