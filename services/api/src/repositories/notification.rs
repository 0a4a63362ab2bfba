//! Notification repository

use anyhow::Result;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::notification::{NewNotification, Notification, UpdateNotification},
};

/// Store a notification
pub async fn insert<'e, E>(executor: E, notification: &NewNotification) -> sqlx::Result<Notification>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (user_id, request_id, kind, title)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, request_id, kind, title, read, visible, created_at
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.request_id)
    .bind(notification.kind.as_str())
    .bind(&notification.title)
    .fetch_one(executor)
    .await
}

/// Hide every notification about a match request
pub async fn hide_for_request<'e, E>(executor: E, request_id: i64) -> sqlx::Result<u64>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("UPDATE notifications SET visible = FALSE WHERE request_id = $1")
        .bind(request_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Notification repository for database operations
#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Notifications of a user, newest first
    pub async fn list_for(&self, user_id: Uuid, include_hidden: bool) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, request_id, kind, title, read, visible, created_at
            FROM notifications
            WHERE user_id = $1 AND ($2 OR visible)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(include_hidden)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    /// Find a notification by ID
    pub async fn find(&self, id: i64) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, request_id, kind, title, read, visible, created_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    /// Update the flags of a notification owned by `user_id`.
    ///
    /// A hidden notification can only be shown again while its match request
    /// is still pending.
    pub async fn update(
        &self,
        id: i64,
        user_id: Uuid,
        update: &UpdateNotification,
    ) -> ApiResult<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications n SET
                read = COALESCE($3, n.read),
                visible = COALESCE($4, n.visible)
            WHERE n.id = $1 AND n.user_id = $2
              AND ($4 IS NOT TRUE OR n.visible OR EXISTS (
                  SELECT 1 FROM match_requests r
                  WHERE r.id = n.request_id AND r.status = 'pending'
              ))
            RETURNING n.id, n.user_id, n.request_id, n.kind, n.title, n.read, n.visible, n.created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(update.read)
        .bind(update.visible)
        .fetch_optional(&self.pool)
        .await?;

        if notification.is_none() {
            let owned = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM notifications WHERE id = $1 AND user_id = $2)",
            )
            .bind(id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

            if owned {
                return Err(ApiError::validation(
                    "visible",
                    "Notifications of a resolved match request cannot be shown again",
                ));
            }
        }

        Ok(notification)
    }
}
