//! Match request repository
//!
//! Every write runs in one transaction: the state change, the match it
//! creates and the notification it owes commit or roll back together.

use anyhow::Result;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{notification, user::are_matched};
use crate::{
    error::{ApiError, ApiResult},
    models::{
        match_request::{
            Decision, MatchError, MatchRequest, MatchRequestQuery, MatchRequestRow, MatchStatus,
            PairState, RequestRole, Transition, check_new_request,
        },
        user::UserRecord,
    },
    notifier::notification_for,
};

/// Both users of a request, in sender/recipient order
struct Pair {
    sender: UserRecord,
    recipient: Option<UserRecord>,
}

/// Load the two users of a request.
///
/// With `lock`, rows are locked in id order so concurrent writes on the same
/// pair serialize.
async fn load_pair(
    conn: &mut PgConnection,
    sender_id: Uuid,
    recipient_id: Uuid,
    lock: bool,
) -> ApiResult<Pair> {
    let sql = if lock {
        r#"
        SELECT id, email, first_name, middle_name, last_name, year, phone, is_staff,
               created_at, updated_at
        FROM users
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#
    } else {
        r#"
        SELECT id, email, first_name, middle_name, last_name, year, phone, is_staff,
               created_at, updated_at
        FROM users
        WHERE id = ANY($1)
        "#
    };

    let users = sqlx::query_as::<_, UserRecord>(sql)
        .bind([sender_id, recipient_id].as_slice())
        .fetch_all(&mut *conn)
        .await?;

    let find = |id: Uuid| users.iter().find(|u| u.id == id).cloned();
    let sender = find(sender_id).ok_or(ApiError::Unauthorized)?;

    Ok(Pair {
        recipient: find(recipient_id),
        sender,
    })
}

async fn pending_exists(conn: &mut PgConnection, from: Uuid, to: Uuid) -> sqlx::Result<bool> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM match_requests
            WHERE sender_id = $1 AND recipient_id = $2 AND status = 'pending'
        )
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_one(conn)
    .await
}

fn into_request(row: MatchRequestRow) -> ApiResult<MatchRequest> {
    MatchRequest::try_from(row).map_err(|e| ApiError::internal("Unreadable match request", e))
}

/// Match request repository for database operations
#[derive(Clone)]
pub struct MatchRequestRepository {
    pool: PgPool,
}

impl MatchRequestRepository {
    /// Create a new match request repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pending request from `sender_id` to `recipient_id` and notify the recipient
    pub async fn create(&self, sender_id: Uuid, recipient_id: Uuid) -> ApiResult<MatchRequest> {
        if sender_id == recipient_id {
            return Err(MatchError::SelfRequest.into());
        }

        let mut tx = self.pool.begin().await?;

        let pair = load_pair(&mut tx, sender_id, recipient_id, true).await?;
        let recipient = pair
            .recipient
            .ok_or_else(|| ApiError::validation("recipient_id", "User not found"))?;

        let state = PairState {
            already_matched: are_matched(&mut *tx, sender_id, recipient_id).await?,
            pending_outgoing: pending_exists(&mut tx, sender_id, recipient_id).await?,
            pending_incoming: pending_exists(&mut tx, recipient_id, sender_id).await?,
        };
        check_new_request(sender_id, recipient_id, state)?;

        let row = sqlx::query_as::<_, MatchRequestRow>(
            r#"
            INSERT INTO match_requests (sender_id, recipient_id, status)
            VALUES ($1, $2, 'pending')
            RETURNING id, sender_id, recipient_id, status, created_at, updated_at
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::from(MatchError::DuplicatePending)
            }
            other => ApiError::from(other),
        })?;
        let request = into_request(row)?;

        if let Some(new) = notification_for(
            &request,
            Transition::Created,
            &pair.sender.display_name(),
            &recipient.display_name(),
        ) {
            notification::insert(&mut *tx, &new).await?;
        }

        tx.commit().await?;

        info!(
            "Match request {} created: {} -> {}",
            request.id, sender_id, recipient_id
        );

        Ok(request)
    }

    /// Answer a request as `actor`.
    ///
    /// The row is locked for the whole transaction; a request that is no longer
    /// pending is returned unchanged with [`Transition::NoOp`].
    pub async fn decide(
        &self,
        id: i64,
        actor: Uuid,
        decision: Decision,
    ) -> ApiResult<(MatchRequest, Transition)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MatchRequestRow>(
            r#"
            SELECT id, sender_id, recipient_id, status, created_at, updated_at
            FROM match_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Match request"))?;

        let mut request = into_request(row)?;
        let transition = request.decide(actor, decision)?;

        let Transition::Transitioned { to, .. } = transition else {
            debug!("Match request {} already {}", id, request.status);
            tx.rollback().await?;
            return Ok((request, transition));
        };

        request.updated_at = sqlx::query_scalar(
            r#"
            UPDATE match_requests SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING updated_at
            "#,
        )
        .bind(id)
        .bind(to.as_str())
        .fetch_one(&mut *tx)
        .await?;

        notification::hide_for_request(&mut *tx, id).await?;

        if to == MatchStatus::Accepted {
            sqlx::query(
                r#"
                INSERT INTO user_matches (user_id, matched_user_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(request.sender_id)
            .bind(request.recipient_id)
            .execute(&mut *tx)
            .await?;
        }

        let pair = load_pair(&mut tx, request.sender_id, request.recipient_id, false).await?;
        let recipient_name = pair
            .recipient
            .as_ref()
            .map(UserRecord::display_name)
            .unwrap_or_default();
        if let Some(new) = notification_for(
            &request,
            transition,
            &pair.sender.display_name(),
            &recipient_name,
        ) {
            notification::insert(&mut *tx, &new).await?;
        }

        tx.commit().await?;

        info!("Match request {} {}", id, request.status);

        Ok((request, transition))
    }

    /// Find a request by ID
    pub async fn find(&self, id: i64) -> ApiResult<Option<MatchRequest>> {
        let row = sqlx::query_as::<_, MatchRequestRow>(
            r#"
            SELECT id, sender_id, recipient_id, status, created_at, updated_at
            FROM match_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_request).transpose()
    }

    /// Requests `user_id` sent or received, newest first
    pub async fn list_for(&self, user_id: Uuid, query: &MatchRequestQuery) -> Result<Vec<MatchRequest>> {
        let role = query.role.map(|role| match role {
            RequestRole::Sent => "sent",
            RequestRole::Received => "received",
        });

        let rows = sqlx::query_as::<_, MatchRequestRow>(
            r#"
            SELECT id, sender_id, recipient_id, status, created_at, updated_at
            FROM match_requests
            WHERE (
                ($2::text IS NULL AND (sender_id = $1 OR recipient_id = $1))
                OR ($2 = 'sent' AND sender_id = $1)
                OR ($2 = 'received' AND recipient_id = $1)
            )
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(role)
        .bind(query.status.map(|status| status.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| MatchRequest::try_from(row).map_err(anyhow::Error::msg))
            .collect()
    }
}
