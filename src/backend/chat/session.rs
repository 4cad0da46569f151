/**
 * Room Session
 *
 * State of one room chat connection and the dispatch of its inbound
 * events. Frames are handled one at a time in arrival order. A frame that
 * fails to decode or an event that fails to apply is logged and the
 * session carries on.
 *
 * New messages go through the tenant's buffered writer and are broadcast
 * before they are persisted. Operations that read a message back (edit,
 * delete, update, reactions) first flush whatever the tenant writer still
 * holds, so a message can be edited right after it was sent.
 */
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::db::MessageStore;
use super::writers::ChatWriters;
use crate::backend::error::{BackendError, StoreError};
use crate::backend::media::{self, MediaHook};
use crate::backend::middleware::auth::AuthenticatedUser;
use crate::backend::realtime::{self, FrameHandler, Peer, RoomHub, RoomKey};
use crate::shared::{NewMessage, ReactionToggle, RoomEvent, RoomOutbound};

/// Largest page a client may ask for
pub const MAX_PAGE_SIZE: i64 = 100;

pub struct RoomSession {
    pub tenant_id: Uuid,
    pub room_id: Uuid,
    pub user: AuthenticatedUser,
    pub peer: Peer,
    pub hub: RoomHub,
    pub store: Arc<dyn MessageStore>,
    pub writers: ChatWriters,
    pub media: Option<Arc<dyn MediaHook>>,
    pub history_limit: i64,
}

impl RoomSession {
    pub fn room(&self) -> RoomKey {
        RoomKey::new(self.tenant_id, self.room_id)
    }

    /// Send the latest messages of the room to this connection
    pub async fn send_history(&self) -> Result<(), BackendError> {
        let messages = self.store.page(self.room_id, self.history_limit, None).await?;
        realtime::reply(&self.peer, &messages)?;
        Ok(())
    }

    /// Decode and apply one client frame
    pub async fn handle_frame(&self, frame: &str) {
        let event = match RoomEvent::decode(frame) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!("[Chat] Dropping malformed frame from {}: {}", self.user.user_id, err);
                return;
            }
        };

        if let Err(err) = self.dispatch(event).await {
            if err.is_client_error() {
                tracing::warn!("[Chat] Event from {} in room {} rejected: {}", self.user.user_id, self.room_id, err);
            } else {
                tracing::error!("[Chat] Event from {} in room {} failed: {}", self.user.user_id, self.room_id, err);
            }
        }
    }

    pub async fn dispatch(&self, event: RoomEvent) -> Result<(), BackendError> {
        match event {
            RoomEvent::NewMessage {
                id,
                message,
                content_url,
                full_name,
                avatar,
            } => {
                let pending = NewMessage {
                    id: id.unwrap_or_else(Uuid::new_v4),
                    user_id: self.user.user_id,
                    room_id: self.room_id,
                    message,
                    created_at: Utc::now(),
                };
                let view = pending.to_view(full_name, avatar, content_url);
                self.writers.messages(self.tenant_id, &self.store).add(pending);
                self.hub.broadcast(self.room(), &RoomOutbound::NewMessage { message: view });
            }

            RoomEvent::EditMessage { id, message } => {
                self.settle_messages().await;
                let message = self.store.edit(self.room_id, id, self.user.user_id, &message).await?;
                self.hub.broadcast(self.room(), &RoomOutbound::MessageEdited { message });
            }

            RoomEvent::DeleteMessage { id } => {
                self.settle_messages().await;
                let urls = self.store.delete(self.room_id, id, self.user.user_id).await?;
                self.hub.broadcast(self.room(), &RoomOutbound::MessageDeleted { id });
                media::remove_attachments(self.media.as_ref(), &urls).await;
            }

            RoomEvent::AddReaction { message_id, emoji } => {
                let writer = self.writers.reactions(self.tenant_id, &self.store);
                if self.writers.reaction_flush_immediately() {
                    self.settle_messages().await;
                    writer.add(ReactionToggle {
                        message_id,
                        user_id: self.user.user_id,
                        emoji,
                    });
                    writer.flush().await;
                    let reactions = self.store.reactions(message_id).await?;
                    self.hub
                        .broadcast(self.room(), &RoomOutbound::MessageReactionsUpdated { message_id, reactions });
                } else {
                    writer.add(ReactionToggle {
                        message_id,
                        user_id: self.user.user_id,
                        emoji: emoji.clone(),
                    });
                    self.hub.broadcast(
                        self.room(),
                        &RoomOutbound::MessageReactionToggled {
                            message_id,
                            user_id: self.user.user_id,
                            emoji,
                        },
                    );
                }
            }

            RoomEvent::LoadMoreMessages { before, limit } => {
                let limit = limit.unwrap_or(self.history_limit).clamp(1, MAX_PAGE_SIZE);
                let messages = self.store.page(self.room_id, limit, before).await?;
                realtime::reply(&self.peer, &RoomOutbound::MessagesBatch { messages })?;
            }

            RoomEvent::UserTyping => {
                self.hub.broadcast(
                    self.room(),
                    &RoomOutbound::UserTyping {
                        user_id: self.user.user_id,
                        room_id: self.room_id,
                    },
                );
            }

            RoomEvent::UpdateMessage { id } => {
                self.settle_messages().await;
                let message = self
                    .store
                    .get(self.room_id, id)
                    .await?
                    .ok_or_else(|| StoreError::not_found("message", id))?;
                self.hub.broadcast(self.room(), &RoomOutbound::MessageUpdated { message });
            }

            RoomEvent::Unknown => {
                tracing::warn!("[Chat] Ignoring unknown event from {}", self.user.user_id);
            }
        }
        Ok(())
    }

    /// Wait until every message sent so far in this tenant is stored
    async fn settle_messages(&self) {
        self.writers.messages(self.tenant_id, &self.store).flush().await;
    }
}

#[async_trait]
impl FrameHandler for RoomSession {
    async fn on_frame(&self, frame: &str) {
        self.handle_frame(frame).await;
    }
}
