//! Chat Writers
//!
//! Per-tenant buffered writers for room messages and reaction toggles. Both
//! pools persist through the tenant's `MessageStore`; the store passed on
//! first use for a tenant is the one its writers keep until retired.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use super::db::MessageStore;
use crate::backend::buffer::{BatchSink, BoxError, BufferedWriter, WriterPool};
use crate::shared::config::BatchPolicy;
use crate::shared::{NewMessage, ReactionToggle};

struct MessageSink(Arc<dyn MessageStore>);

#[async_trait]
impl BatchSink<NewMessage> for MessageSink {
    async fn persist(&self, batch: Vec<NewMessage>) -> Result<(), BoxError> {
        self.0.insert_messages(&batch).await?;
        Ok(())
    }
}

struct ReactionSink(Arc<dyn MessageStore>);

#[async_trait]
impl BatchSink<ReactionToggle> for ReactionSink {
    async fn persist(&self, batch: Vec<ReactionToggle>) -> Result<(), BoxError> {
        self.0.apply_reactions(&batch).await?;
        Ok(())
    }
}

struct Writers {
    messages: WriterPool<NewMessage, Arc<dyn MessageStore>>,
    reactions: WriterPool<ReactionToggle, Arc<dyn MessageStore>>,
    reaction_flush_immediately: bool,
}

#[derive(Clone)]
pub struct ChatWriters {
    inner: Arc<Writers>,
}

impl ChatWriters {
    pub fn new(message_batch: BatchPolicy, reaction_batch: BatchPolicy, reaction_flush_immediately: bool) -> Self {
        let messages = WriterPool::new(move |tenant_id: Uuid, store: Arc<dyn MessageStore>| {
            BufferedWriter::<NewMessage>::builder(format!("messages:{}", tenant_id), Arc::new(MessageSink(store)))
                .policy(message_batch)
                .spawn()
        });
        let reactions = WriterPool::new(move |tenant_id: Uuid, store: Arc<dyn MessageStore>| {
            BufferedWriter::<ReactionToggle>::builder(format!("reactions:{}", tenant_id), Arc::new(ReactionSink(store)))
                .policy(reaction_batch)
                .spawn()
        });

        Self {
            inner: Arc::new(Writers {
                messages,
                reactions,
                reaction_flush_immediately,
            }),
        }
    }

    pub fn messages(&self, tenant_id: Uuid, store: &Arc<dyn MessageStore>) -> Arc<BufferedWriter<NewMessage>> {
        self.inner.messages.get_or_create(tenant_id, store.clone())
    }

    pub fn reactions(&self, tenant_id: Uuid, store: &Arc<dyn MessageStore>) -> Arc<BufferedWriter<ReactionToggle>> {
        self.inner.reactions.get_or_create(tenant_id, store.clone())
    }

    pub fn reaction_flush_immediately(&self) -> bool {
        self.inner.reaction_flush_immediately
    }

    /// Close and forget the writers of one tenant, persisting what they hold
    pub async fn retire(&self, tenant_id: Uuid) {
        if let Some(writer) = self.inner.messages.remove(tenant_id) {
            writer.close().await;
        }
        if let Some(writer) = self.inner.reactions.remove(tenant_id) {
            writer.close().await;
        }
    }

    /// Close every writer; returns the number of items persisted on the way out
    pub async fn close_all(&self) -> usize {
        let mut flushed = 0;
        for writer in self.inner.messages.drain() {
            flushed += writer.close().await;
        }
        for writer in self.inner.reactions.drain() {
            flushed += writer.close().await;
        }
        if flushed > 0 {
            tracing::info!("[Chat] Flushed {} buffered items on shutdown", flushed);
        }
        flushed
    }
}
