/**
 * Room Message Store
 *
 * `MessageStore` is everything a room session needs from the tenant
 * database. `PgMessageStore` implements it on a tenant's `PgPool`.
 *
 * Reads return hydrated `Message` views: the row joined with its author's
 * display fields, its attachment urls from `media` and its reactions.
 * Edits and deletes are author-only and scoped to the room they are issued
 * from.
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::backend::error::StoreError;
use crate::shared::{Message, NewMessage, Reaction, ReactionToggle};

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Up to `limit` messages of `room_id` older than `before` (or the
    /// newest ones), oldest first
    async fn page(&self, room_id: Uuid, limit: i64, before: Option<Uuid>) -> Result<Vec<Message>, StoreError>;

    async fn get(&self, room_id: Uuid, id: Uuid) -> Result<Option<Message>, StoreError>;

    /// Insert a flushed batch; ids already present are skipped
    async fn insert_messages(&self, batch: &[NewMessage]) -> Result<(), StoreError>;

    async fn edit(&self, room_id: Uuid, id: Uuid, author: Uuid, text: &str) -> Result<Message, StoreError>;

    /// Delete a message with its reactions and media rows; returns the
    /// attachment urls that were attached to it
    async fn delete(&self, room_id: Uuid, id: Uuid, author: Uuid) -> Result<Vec<String>, StoreError>;

    /// Apply a batch of reaction toggles in order, in one transaction
    async fn apply_reactions(&self, batch: &[ReactionToggle]) -> Result<(), StoreError>;

    async fn reactions(&self, message_id: Uuid) -> Result<Vec<Reaction>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    user_id: Uuid,
    room_id: Uuid,
    message: String,
    created_at: DateTime<Utc>,
    edited_at: Option<DateTime<Utc>>,
    full_name: String,
    avatar: String,
}

const SELECT_MESSAGES: &str = r#"
    SELECT m.id, m.user_id, m.room_id, m.message, m.created_at, m.edited_at,
           COALESCE(u.full_name, '') AS full_name,
           COALESCE(u.avatar, '') AS avatar
    FROM messages m
    LEFT JOIN users u ON u.id = m.user_id
"#;

/// Keyset cursor for `page`: rows strictly before message `$3` in the
/// `(created_at, id)` order, looked up in the same room `$1`
const BEFORE_CURSOR: &str =
    "($3::uuid IS NULL OR (m.created_at, m.id) < (SELECT created_at, id FROM messages WHERE id = $3 AND room_id = $1))";

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach media urls and reactions to fetched rows
    async fn hydrate(&self, rows: Vec<MessageRow>) -> Result<Vec<Message>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();

        let mut media: HashMap<Uuid, Vec<String>> = HashMap::new();
        let media_rows = sqlx::query(
            r#"
            SELECT content_id, url FROM media
            WHERE content_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        for row in media_rows {
            media.entry(row.get("content_id")).or_default().push(row.get("url"));
        }

        let mut reactions: HashMap<Uuid, Vec<Reaction>> = HashMap::new();
        let reaction_rows = sqlx::query(
            r#"
            SELECT message_id, user_id, emoji FROM reactions
            WHERE message_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        for row in reaction_rows {
            reactions.entry(row.get("message_id")).or_default().push(Reaction {
                user_id: row.get("user_id"),
                emoji: row.get("emoji"),
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| Message {
                content_url: media.remove(&row.id).unwrap_or_default(),
                reactions: reactions.remove(&row.id).unwrap_or_default(),
                id: row.id,
                user_id: row.user_id,
                room_id: row.room_id,
                full_name: row.full_name,
                avatar: row.avatar,
                message: row.message,
                created_at: row.created_at,
                edited_at: row.edited_at,
            })
            .collect())
    }

    /// Author of message `id` in `room_id`, failing when it is missing or
    /// belongs to someone else
    async fn check_author<'c, E>(executor: E, room_id: Uuid, id: Uuid, author: Uuid) -> Result<(), StoreError>
    where
        E: sqlx::Executor<'c, Database = Postgres>,
    {
        let owner: Option<Uuid> = sqlx::query_scalar("SELECT user_id FROM messages WHERE id = $1 AND room_id = $2 FOR UPDATE")
            .bind(id)
            .bind(room_id)
            .fetch_optional(executor)
            .await?;

        match owner {
            None => Err(StoreError::not_found("message", id)),
            Some(owner) if owner != author => Err(StoreError::forbidden("message", id, author)),
            Some(_) => Ok(()),
        }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn page(&self, room_id: Uuid, limit: i64, before: Option<Uuid>) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            r#"{SELECT_MESSAGES}
            WHERE m.room_id = $1
              AND {BEFORE_CURSOR}
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $2
            "#
        );
        let mut rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(room_id)
            .bind(limit)
            .bind(before)
            .fetch_all(&self.pool)
            .await?;
        rows.reverse();
        self.hydrate(rows).await
    }

    async fn get(&self, room_id: Uuid, id: Uuid) -> Result<Option<Message>, StoreError> {
        let sql = format!("{SELECT_MESSAGES} WHERE m.id = $1 AND m.room_id = $2");
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id)
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn insert_messages(&self, batch: &[NewMessage]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO messages (id, user_id, room_id, message, created_at, updated_at) ");
        builder.push_values(batch, |mut row, message| {
            row.push_bind(message.id)
                .push_bind(message.user_id)
                .push_bind(message.room_id)
                .push_bind(message.message.clone())
                .push_bind(message.created_at)
                .push_bind(message.created_at);
        });
        builder.push(" ON CONFLICT (id) DO NOTHING");
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn edit(&self, room_id: Uuid, id: Uuid, author: Uuid, text: &str) -> Result<Message, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::check_author(&mut *tx, room_id, id, author).await?;
        sqlx::query("UPDATE messages SET message = $1, edited_at = NOW(), updated_at = NOW() WHERE id = $2")
            .bind(text)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.get(room_id, id)
            .await?
            .ok_or_else(|| StoreError::not_found("message", id))
    }

    async fn delete(&self, room_id: Uuid, id: Uuid, author: Uuid) -> Result<Vec<String>, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::check_author(&mut *tx, room_id, id, author).await?;

        let urls: Vec<String> = sqlx::query_scalar("DELETE FROM media WHERE content_id = $1 RETURNING url")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM reactions WHERE message_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(urls)
    }

    async fn apply_reactions(&self, batch: &[ReactionToggle]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for toggle in batch {
            let current: Option<String> =
                sqlx::query_scalar("SELECT emoji FROM reactions WHERE user_id = $1 AND message_id = $2 FOR UPDATE")
                    .bind(toggle.user_id)
                    .bind(toggle.message_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            match current {
                Some(emoji) if emoji == toggle.emoji => {
                    sqlx::query("DELETE FROM reactions WHERE user_id = $1 AND message_id = $2")
                        .bind(toggle.user_id)
                        .bind(toggle.message_id)
                        .execute(&mut *tx)
                        .await?;
                }
                Some(_) => {
                    sqlx::query("UPDATE reactions SET emoji = $3 WHERE user_id = $1 AND message_id = $2")
                        .bind(toggle.user_id)
                        .bind(toggle.message_id)
                        .bind(&toggle.emoji)
                        .execute(&mut *tx)
                        .await?;
                }
                None => {
                    // Skipped when the message is gone or not flushed yet
                    sqlx::query(
                        r#"
                        INSERT INTO reactions (id, user_id, message_id, emoji, created_at)
                        SELECT $1, $2, $3, $4, NOW()
                        WHERE EXISTS (SELECT 1 FROM messages WHERE id = $3)
                        "#,
                    )
                    .bind(Uuid::new_v4())
                    .bind(toggle.user_id)
                    .bind(toggle.message_id)
                    .bind(&toggle.emoji)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn reactions(&self, message_id: Uuid) -> Result<Vec<Reaction>, StoreError> {
        let rows = sqlx::query("SELECT user_id, emoji FROM reactions WHERE message_id = $1 ORDER BY created_at ASC")
            .bind(message_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Reaction {
                user_id: row.get("user_id"),
                emoji: row.get("emoji"),
            })
            .collect())
    }
}
