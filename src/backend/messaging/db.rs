//! Direct message persistence
//!
//! Conversations are unique per unordered pair of users. New rows store the
//! pair normalized (lower id first), but lookups check both orderings so
//! rows written by older clients in either order are still found.
//! Messages are written straight through, without buffering.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::backend::error::StoreError;
use crate::shared::messaging::{ordered_pair, Conversation, ConversationHistory, DirectMessage};

/// Keyset cursor for `messages_before`: rows strictly before message `$3`
/// in the `(created_at, id)` order, looked up in the same conversation `$1`
const BEFORE_CURSOR: &str = "($3::uuid IS NULL OR (created_at, id) < (SELECT created_at, id FROM direct_messages WHERE id = $3 AND conversation_id = $1))";

#[async_trait]
pub trait DirectStore: Send + Sync {
    async fn find_conversation(&self, a: Uuid, b: Uuid) -> Result<Option<Conversation>, StoreError>;

    /// Existing conversation between `a` and `b`, or a new one
    async fn find_or_create_conversation(&self, a: Uuid, b: Uuid) -> Result<Conversation, StoreError>;

    async fn append_message(&self, conversation: &Conversation, sender: Uuid, text: &str) -> Result<DirectMessage, StoreError>;

    /// Every conversation of `user_id` with its latest `limit` messages,
    /// most recently active first
    async fn recent_conversations(&self, user_id: Uuid, limit: i64) -> Result<Vec<ConversationHistory>, StoreError>;

    /// Up to `limit` messages older than `before` (or the newest), oldest first
    async fn messages_before(&self, conversation_id: Uuid, before: Option<Uuid>, limit: i64) -> Result<Vec<DirectMessage>, StoreError>;

    async fn edit_message(&self, id: Uuid, author: Uuid, text: &str) -> Result<(Conversation, DirectMessage), StoreError>;

    /// Delete a message; returns its conversation and the attachment urls
    /// that were attached to it
    async fn delete_message(&self, id: Uuid, author: Uuid) -> Result<(Conversation, Vec<String>), StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgDirectStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    user1_id: Uuid,
    user2_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            user1_id: row.user1_id,
            user2_id: row.user2_id,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    text: String,
    read: bool,
    created_at: DateTime<Utc>,
    edited_at: Option<DateTime<Utc>>,
}

impl From<MessageRow> for DirectMessage {
    fn from(row: MessageRow) -> Self {
        DirectMessage {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            text: row.text,
            read: row.read,
            created_at: row.created_at,
            edited_at: row.edited_at,
        }
    }
}

impl PgDirectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn conversation_by_id<'c, E>(executor: E, id: Uuid) -> Result<Conversation, StoreError>
    where
        E: sqlx::Executor<'c, Database = Postgres>,
    {
        sqlx::query_as::<_, ConversationRow>(
            "SELECT id, user1_id, user2_id, created_at FROM direct_conversations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(Conversation::from)
        .ok_or_else(|| StoreError::not_found("conversation", id))
    }

    /// Conversation of message `id`, failing unless `author` sent it
    async fn check_sender<'c, E>(executor: E, id: Uuid, author: Uuid) -> Result<Uuid, StoreError>
    where
        E: sqlx::Executor<'c, Database = Postgres>,
    {
        let row: Option<(Uuid, Uuid)> =
            sqlx::query_as("SELECT conversation_id, sender_id FROM direct_messages WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(executor)
                .await?;

        match row {
            None => Err(StoreError::not_found("direct message", id)),
            Some((_, sender)) if sender != author => Err(StoreError::forbidden("direct message", id, author)),
            Some((conversation_id, _)) => Ok(conversation_id),
        }
    }
}

#[async_trait]
impl DirectStore for PgDirectStore {
    async fn find_conversation(&self, a: Uuid, b: Uuid) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, user1_id, user2_id, created_at FROM direct_conversations
            WHERE (user1_id = $1 AND user2_id = $2) OR (user1_id = $2 AND user2_id = $1)
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Conversation::from))
    }

    async fn find_or_create_conversation(&self, a: Uuid, b: Uuid) -> Result<Conversation, StoreError> {
        if let Some(conversation) = self.find_conversation(a, b).await? {
            return Ok(conversation);
        }

        let (user1_id, user2_id) = ordered_pair(a, b);
        sqlx::query(
            r#"
            INSERT INTO direct_conversations (id, user1_id, user2_id, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user1_id, user2_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user1_id)
        .bind(user2_id)
        .execute(&self.pool)
        .await?;

        // Whoever won the insert race, the row exists now
        self.find_conversation(a, b)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn append_message(&self, conversation: &Conversation, sender: Uuid, text: &str) -> Result<DirectMessage, StoreError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO direct_messages (id, conversation_id, sender_id, text, read, created_at)
            VALUES ($1, $2, $3, $4, FALSE, NOW())
            RETURNING id, conversation_id, sender_id, text, read, created_at, edited_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(conversation.id)
        .bind(sender)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn recent_conversations(&self, user_id: Uuid, limit: i64) -> Result<Vec<ConversationHistory>, StoreError> {
        let conversations = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT c.id, c.user1_id, c.user2_id, c.created_at
            FROM direct_conversations c
            LEFT JOIN LATERAL (
                SELECT MAX(created_at) AS last_at FROM direct_messages WHERE conversation_id = c.id
            ) latest ON TRUE
            WHERE c.user1_id = $1 OR c.user2_id = $1
            ORDER BY COALESCE(latest.last_at, c.created_at) DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut histories = Vec::with_capacity(conversations.len());
        for row in conversations {
            let conversation = Conversation::from(row);
            let Some(with) = conversation.other_participant(user_id) else {
                continue;
            };
            let messages = self.messages_before(conversation.id, None, limit).await?;
            histories.push(ConversationHistory {
                conversation_id: conversation.id,
                with,
                messages,
            });
        }
        Ok(histories)
    }

    async fn messages_before(&self, conversation_id: Uuid, before: Option<Uuid>, limit: i64) -> Result<Vec<DirectMessage>, StoreError> {
        let sql = format!(
            r#"
            SELECT id, conversation_id, sender_id, text, read, created_at, edited_at
            FROM direct_messages
            WHERE conversation_id = $1
              AND {BEFORE_CURSOR}
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        );
        let mut rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(conversation_id)
            .bind(limit)
            .bind(before)
            .fetch_all(&self.pool)
            .await?;
        rows.reverse();
        Ok(rows.into_iter().map(DirectMessage::from).collect())
    }

    async fn edit_message(&self, id: Uuid, author: Uuid, text: &str) -> Result<(Conversation, DirectMessage), StoreError> {
        let mut tx = self.pool.begin().await?;
        let conversation_id = Self::check_sender(&mut *tx, id, author).await?;

        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            UPDATE direct_messages SET text = $1, edited_at = NOW()
            WHERE id = $2
            RETURNING id, conversation_id, sender_id, text, read, created_at, edited_at
            "#,
        )
        .bind(text)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        let conversation = Self::conversation_by_id(&mut *tx, conversation_id).await?;
        tx.commit().await?;

        Ok((conversation, row.into()))
    }

    async fn delete_message(&self, id: Uuid, author: Uuid) -> Result<(Conversation, Vec<String>), StoreError> {
        let mut tx = self.pool.begin().await?;
        let conversation_id = Self::check_sender(&mut *tx, id, author).await?;

        let urls: Vec<String> = sqlx::query_scalar("DELETE FROM media WHERE content_id = $1 RETURNING url")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM direct_messages WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let conversation = Self::conversation_by_id(&mut *tx, conversation_id).await?;
        tx.commit().await?;

        Ok((conversation, urls))
    }
}
