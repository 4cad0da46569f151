/**
 * Direct Session
 *
 * One user's direct-messaging connection. Messages are persisted before
 * they are delivered; typing and read receipts are relayed without
 * touching the database.
 *
 * Routing:
 * - `new_message` goes to the recipient only
 * - edits and deletes go to both participants
 * - typing and read receipts go to both participants except this
 *   connection
 * - pages are answered on this connection only
 */
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use super::db::DirectStore;
use crate::backend::chat::session::MAX_PAGE_SIZE;
use crate::backend::error::BackendError;
use crate::backend::media::{self, MediaHook};
use crate::backend::middleware::auth::AuthenticatedUser;
use crate::backend::realtime::{self, DirectHub, FrameHandler, Peer};
use crate::shared::messaging::{DirectEvent, DirectOutbound};

pub struct DirectSession {
    pub tenant_id: Uuid,
    pub user: AuthenticatedUser,
    pub peer: Peer,
    pub hub: DirectHub,
    pub store: Arc<dyn DirectStore>,
    pub media: Option<Arc<dyn MediaHook>>,
    pub history_limit: i64,
}

impl DirectSession {
    /// Send every conversation of the user with its latest messages
    pub async fn send_history(&self) -> Result<(), BackendError> {
        let histories = self
            .store
            .recent_conversations(self.user.user_id, self.history_limit)
            .await?;
        realtime::reply(&self.peer, &histories)?;
        Ok(())
    }

    pub async fn handle_frame(&self, frame: &str) {
        let event = match DirectEvent::decode(frame, self.user.user_id) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!("[Direct] Dropping malformed frame from {}: {}", self.user.user_id, err);
                return;
            }
        };

        if let Err(err) = self.dispatch(event).await {
            if err.is_client_error() {
                tracing::warn!("[Direct] Event from {} rejected: {}", self.user.user_id, err);
            } else {
                tracing::error!("[Direct] Event from {} failed: {}", self.user.user_id, err);
            }
        }
    }

    pub async fn dispatch(&self, event: DirectEvent) -> Result<(), BackendError> {
        let me = self.user.user_id;

        match event {
            DirectEvent::NewMessage { to, text } => {
                let conversation = self.store.find_or_create_conversation(me, to).await?;
                let message = self.store.append_message(&conversation, me, &text).await?;
                let delivery = self
                    .hub
                    .send_to(self.tenant_id, to, &DirectOutbound::NewMessage { message });
                if delivery.delivered == 0 {
                    tracing::debug!("[Direct] {} is offline; message stored only", to);
                }
            }

            DirectEvent::EditMessage { id, text } => {
                let (conversation, message) = self.store.edit_message(id, me, &text).await?;
                self.hub.broadcast(
                    self.tenant_id,
                    &conversation.participants(),
                    &DirectOutbound::MessageEdited { message },
                    None,
                );
            }

            DirectEvent::DeleteMessage { id } => {
                let (conversation, urls) = self.store.delete_message(id, me).await?;
                self.hub.broadcast(
                    self.tenant_id,
                    &conversation.participants(),
                    &DirectOutbound::MessageDeleted {
                        id,
                        conversation_id: conversation.id,
                    },
                    None,
                );
                media::remove_attachments(self.media.as_ref(), &urls).await;
            }

            DirectEvent::LoadMoreMessages { with, before, limit } => {
                let limit = limit.unwrap_or(self.history_limit).clamp(1, MAX_PAGE_SIZE);
                let messages = match self.store.find_conversation(me, with).await? {
                    Some(conversation) => self.store.messages_before(conversation.id, before, limit).await?,
                    None => Vec::new(),
                };
                realtime::reply(&self.peer, &DirectOutbound::MessagesBatch { with, messages })?;
            }

            DirectEvent::UserTyping { to } => {
                self.hub.broadcast(
                    self.tenant_id,
                    &[me, to],
                    &DirectOutbound::UserTyping { from: me },
                    Some(self.peer.id()),
                );
            }

            DirectEvent::MarkRead { to, message_id } => {
                self.hub.broadcast(
                    self.tenant_id,
                    &[me, to],
                    &DirectOutbound::MessageRead { from: me, message_id },
                    Some(self.peer.id()),
                );
            }

            DirectEvent::Unknown => {
                tracing::warn!("[Direct] Ignoring unknown event from {}", me);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FrameHandler for DirectSession {
    async fn on_frame(&self, frame: &str) {
        self.handle_frame(frame).await;
    }
}
