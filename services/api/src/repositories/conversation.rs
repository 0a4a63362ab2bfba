//! Conversation and message repository

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use super::user::matched_among;
use crate::{
    error::{ApiError, ApiResult},
    models::conversation::{Conversation, Message, check_write_access},
    stream::MessageFeed,
};

/// Conversation repository for database operations
#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    /// Create a new conversation repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Start a conversation between `creator` and `participants`.
    ///
    /// Every participant must exist and be matched with the creator, who is
    /// always added.
    pub async fn create(&self, creator: Uuid, participants: Vec<Uuid>) -> ApiResult<Conversation> {
        let mut members = vec![creator];
        members.extend(participants.into_iter().filter(|id| *id != creator));

        if members.len() < 2 {
            return Err(ApiError::validation(
                "participants",
                "At least one other participant is required",
            ));
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ANY($1)")
            .bind(&members)
            .fetch_one(&self.pool)
            .await?;
        if existing != members.len() as i64 {
            return Err(ApiError::validation("participants", "Unknown participant id"));
        }

        let others = &members[1..];
        let matched = matched_among(&self.pool, creator, others).await?;
        if others.iter().any(|id| !matched.contains(id)) {
            return Err(ApiError::validation(
                "participants",
                "You can only start conversations with users you are matched with",
            ));
        }

        let mut tx = self.pool.begin().await?;

        let (id, created_at, updated_at): (i64, DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO conversations DEFAULT VALUES RETURNING id, created_at, updated_at",
        )
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO conversation_participants (conversation_id, user_id)
            SELECT $1, UNNEST($2::uuid[])
            "#,
        )
        .bind(id)
        .bind(&members)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Conversation {
            id,
            participants: members,
            created_at,
            updated_at,
        })
    }

    /// Conversations of a user, most recently active first
    pub async fn list_for(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT c.id, c.created_at, c.updated_at,
                   ARRAY(
                       SELECT p.user_id FROM conversation_participants p
                       WHERE p.conversation_id = c.id
                       ORDER BY p.user_id
                   ) AS participants
            FROM conversations c
            JOIN conversation_participants me
              ON me.conversation_id = c.id AND me.user_id = $1
            ORDER BY c.updated_at DESC, c.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }

    /// Find a conversation by ID
    pub async fn find(&self, id: i64) -> Result<Option<Conversation>> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT c.id, c.created_at, c.updated_at,
                   ARRAY(
                       SELECT p.user_id FROM conversation_participants p
                       WHERE p.conversation_id = c.id
                       ORDER BY p.user_id
                   ) AS participants
            FROM conversations c
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    /// Other participants of `conversation` that `user_id` is matched with
    pub async fn matched_partners(
        &self,
        conversation: &Conversation,
        user_id: Uuid,
    ) -> Result<HashSet<Uuid>> {
        let others = conversation.others(user_id);
        Ok(matched_among(&self.pool, user_id, &others).await?)
    }

    /// Messages in send order, optionally only those sent strictly after `since`
    pub async fn messages(
        &self,
        conversation_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, sender_id, content, read, sent_at
            FROM messages
            WHERE conversation_id = $1
              AND ($2::timestamptz IS NULL OR sent_at > $2)
            ORDER BY sent_at, id
            "#,
        )
        .bind(conversation_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Store a message and bump the conversation's last activity
    pub async fn insert_message(
        &self,
        conversation_id: i64,
        sender_id: Uuid,
        content: &str,
    ) -> Result<Message> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (conversation_id, sender_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, conversation_id, sender_id, content, read, sent_at
            "#,
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(message.sent_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(message)
    }
}

impl MessageFeed for ConversationRepository {
    async fn messages_after(&self, conversation_id: i64, after_id: i64) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, sender_id, content, read, sent_at
            FROM messages
            WHERE conversation_id = $1 AND id > $2
            ORDER BY id
            "#,
        )
        .bind(conversation_id)
        .bind(after_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn may_stream(&self, conversation_id: i64, user_id: Uuid) -> Result<bool> {
        let Some(conversation) = self.find(conversation_id).await? else {
            return Ok(false);
        };
        let matched = self.matched_partners(&conversation, user_id).await?;

        Ok(check_write_access(&conversation, user_id, &matched).is_ok())
    }
}
