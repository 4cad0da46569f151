//! Conversation Data Structure
//!
//! A direct conversation between exactly two users. The pair is unordered:
//! (a, b) and (b, a) name the same conversation. Rows written by this server
//! store the pair normalized, lower id first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::DirectMessage;

/// Two-party conversation record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new conversation between two users, normalizing the pair
    pub fn new_direct(a: Uuid, b: Uuid) -> Self {
        let (user1_id, user2_id) = ordered_pair(a, b);
        Self {
            id: Uuid::new_v4(),
            user1_id,
            user2_id,
            created_at: Utc::now(),
        }
    }

    /// Check if user is a participant
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    /// Get the other participant, `None` if `user_id` is not part of it
    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        if self.user1_id == user_id {
            Some(self.user2_id)
        } else if self.user2_id == user_id {
            Some(self.user1_id)
        } else {
            None
        }
    }

    pub fn participants(&self) -> [Uuid; 2] {
        [self.user1_id, self.user2_id]
    }

    /// Whether this conversation is between `a` and `b`, in either order
    pub fn is_between(&self, a: Uuid, b: Uuid) -> bool {
        (self.user1_id == a && self.user2_id == b) || (self.user1_id == b && self.user2_id == a)
    }
}

/// Normalize an unordered pair of user ids
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// One entry of the snapshot sent when a direct chat socket connects
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationHistory {
    pub conversation_id: Uuid,
    /// The other participant
    pub with: Uuid,
    /// Latest messages, oldest first
    pub messages: Vec<DirectMessage>,
}
