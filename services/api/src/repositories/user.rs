//! User repository for profile, skill set, match and rating queries

use anyhow::Result;
use sqlx::{Executor, PgPool, Postgres, Row};
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

use crate::{
    compatibility::SkillProfile,
    error::{ApiError, ApiResult},
    models::{
        PageQuery,
        skill::Skill,
        user::{Rating, UpdateProfileRequest, UserRecord},
    },
};

/// Whether `a` and `b` share a match, in either direction
pub async fn are_matched<'e, E>(executor: E, a: Uuid, b: Uuid) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM user_matches
            WHERE (user_id = $1 AND matched_user_id = $2)
               OR (user_id = $2 AND matched_user_id = $1)
        )
        "#,
    )
    .bind(a)
    .bind(b)
    .fetch_one(executor)
    .await
}

/// The subset of `candidates` that share a match with `user_id`
pub async fn matched_among<'e, E>(
    executor: E,
    user_id: Uuid,
    candidates: &[Uuid],
) -> sqlx::Result<HashSet<Uuid>>
where
    E: Executor<'e, Database = Postgres>,
{
    if candidates.is_empty() {
        return Ok(HashSet::new());
    }

    let ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT matched_user_id FROM user_matches
        WHERE user_id = $1 AND matched_user_id = ANY($2)
        UNION
        SELECT user_id FROM user_matches
        WHERE matched_user_id = $1 AND user_id = ANY($2)
        "#,
    )
    .bind(user_id)
    .bind(candidates)
    .fetch_all(executor)
    .await?;

    Ok(ids.into_iter().collect())
}

fn profile_from_row(row: &sqlx::postgres::PgRow) -> Result<SkillProfile> {
    let known: Vec<i64> = row.try_get("known_skill_ids")?;
    let desired: Vec<i64> = row.try_get("desired_skill_ids")?;

    Ok(SkillProfile {
        user: UserRecord {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            middle_name: row.try_get("middle_name")?,
            last_name: row.try_get("last_name")?,
            year: row.try_get("year")?,
            phone: row.try_get("phone")?,
            is_staff: row.try_get("is_staff")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        },
        known: known.into_iter().collect::<BTreeSet<_>>(),
        desired: desired.into_iter().collect::<BTreeSet<_>>(),
    })
}

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, first_name, middle_name, last_name, year, phone, is_staff,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Get a page of users, newest first
    pub async fn list(&self, page: &PageQuery) -> Result<(Vec<UserRecord>, i64)> {
        let users = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, first_name, middle_name, last_name, year, phone, is_staff,
                   created_at, updated_at
            FROM users
            ORDER BY created_at DESC, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit() as i64)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok((users, count))
    }

    /// Known and desired skills of a user
    pub async fn skills_of(&self, user_id: Uuid) -> Result<(Vec<Skill>, Vec<Skill>)> {
        let known = sqlx::query_as::<_, Skill>(
            r#"
            SELECT s.id, s.name, s.category_id, c.name AS category_name
            FROM user_known_skills us
            JOIN skills s ON s.id = us.skill_id
            LEFT JOIN skill_categories c ON c.id = s.category_id
            WHERE us.user_id = $1
            ORDER BY s.name, s.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let desired = sqlx::query_as::<_, Skill>(
            r#"
            SELECT s.id, s.name, s.category_id, c.name AS category_name
            FROM user_desired_skills us
            JOIN skills s ON s.id = us.skill_id
            LEFT JOIN skill_categories c ON c.id = s.category_id
            WHERE us.user_id = $1
            ORDER BY s.name, s.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok((known, desired))
    }

    /// Apply a validated profile update; skill lists replace the stored sets.
    ///
    /// Unknown skill ids reject the whole update.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: &UpdateProfileRequest,
    ) -> ApiResult<Option<UserRecord>> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                middle_name = CASE WHEN $3 THEN $4 ELSE middle_name END,
                last_name = COALESCE($5, last_name),
                year = CASE WHEN $6 THEN $7 ELSE year END,
                phone = CASE WHEN $8 THEN $9 ELSE phone END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, first_name, middle_name, last_name, year, phone, is_staff,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(update.first_name.as_deref())
        .bind(update.middle_name.is_some())
        .bind(update.middle_name.clone().flatten())
        .bind(update.last_name.as_deref())
        .bind(update.year.is_some())
        .bind(update.year.flatten())
        .bind(update.phone.is_some())
        .bind(update.phone.clone().flatten())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user) = user else {
            return Ok(None);
        };

        for (table, field, ids) in [
            ("user_known_skills", "known_skills", &update.known_skills),
            ("user_desired_skills", "desired_skills", &update.desired_skills),
        ] {
            let Some(ids) = ids else { continue };
            let ids: Vec<i64> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();

            let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM skills WHERE id = ANY($1)")
                .bind(&ids)
                .fetch_one(&mut *tx)
                .await?;
            if existing != ids.len() as i64 {
                return Err(ApiError::validation(field, "Unknown skill id"));
            }

            sqlx::query(&format!("DELETE FROM {} WHERE user_id = $1", table))
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(&format!(
                "INSERT INTO {} (user_id, skill_id) SELECT $1, UNNEST($2::bigint[])",
                table
            ))
            .bind(user_id)
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Some(user))
    }

    /// Everyone `user_id` is matched with, in either direction
    pub async fn matches_of(&self, user_id: Uuid) -> Result<Vec<UserRecord>> {
        let users = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT u.id, u.email, u.first_name, u.middle_name, u.last_name, u.year, u.phone,
                   u.is_staff, u.created_at, u.updated_at
            FROM users u
            WHERE u.id IN (
                SELECT matched_user_id FROM user_matches WHERE user_id = $1
                UNION
                SELECT user_id FROM user_matches WHERE matched_user_id = $1
            )
            ORDER BY u.first_name, u.last_name, u.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Users whose names or skills match `pattern` (a `LIKE` pattern)
    pub async fn search(&self, pattern: &str) -> Result<Vec<UserRecord>> {
        let users = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT u.id, u.email, u.first_name, u.middle_name, u.last_name, u.year, u.phone,
                   u.is_staff, u.created_at, u.updated_at
            FROM users u
            WHERE u.first_name ILIKE $1
               OR u.middle_name ILIKE $1
               OR u.last_name ILIKE $1
               OR EXISTS (
                   SELECT 1 FROM user_known_skills us JOIN skills s ON s.id = us.skill_id
                   WHERE us.user_id = u.id AND s.name ILIKE $1
               )
               OR EXISTS (
                   SELECT 1 FROM user_desired_skills us JOIN skills s ON s.id = us.skill_id
                   WHERE us.user_id = u.id AND s.name ILIKE $1
               )
            ORDER BY u.first_name, u.last_name, u.id
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// A user's skill sets
    pub async fn skill_profile(&self, user_id: Uuid) -> Result<Option<SkillProfile>> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.email, u.first_name, u.middle_name, u.last_name, u.year, u.phone,
                   u.is_staff, u.created_at, u.updated_at,
                   ARRAY(SELECT skill_id FROM user_known_skills WHERE user_id = u.id)
                       AS known_skill_ids,
                   ARRAY(SELECT skill_id FROM user_desired_skills WHERE user_id = u.id)
                       AS desired_skill_ids
            FROM users u
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    /// Skill sets of every other user sharing at least one exchangeable skill with `user_id`
    pub async fn candidate_profiles(&self, user_id: Uuid) -> Result<Vec<SkillProfile>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.email, u.first_name, u.middle_name, u.last_name, u.year, u.phone,
                   u.is_staff, u.created_at, u.updated_at,
                   ARRAY(SELECT skill_id FROM user_known_skills WHERE user_id = u.id)
                       AS known_skill_ids,
                   ARRAY(SELECT skill_id FROM user_desired_skills WHERE user_id = u.id)
                       AS desired_skill_ids
            FROM users u
            WHERE u.id <> $1
              AND (
                  EXISTS (
                      SELECT 1 FROM user_known_skills k
                      JOIN user_desired_skills mine ON mine.skill_id = k.skill_id
                      WHERE k.user_id = u.id AND mine.user_id = $1
                  )
                  OR EXISTS (
                      SELECT 1 FROM user_desired_skills d
                      JOIN user_known_skills mine ON mine.skill_id = d.skill_id
                      WHERE d.user_id = u.id AND mine.user_id = $1
                  )
              )
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(profile_from_row).collect()
    }

    /// Create or replace the rating `rater_id` gave `ratee_id`
    pub async fn rate(
        &self,
        rater_id: Uuid,
        ratee_id: Uuid,
        score: i16,
        comment: Option<&str>,
    ) -> Result<Rating> {
        let rating = sqlx::query_as::<_, Rating>(
            r#"
            INSERT INTO user_ratings (rater_id, ratee_id, score, comment)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (rater_id, ratee_id)
            DO UPDATE SET score = EXCLUDED.score, comment = EXCLUDED.comment, updated_at = NOW()
            RETURNING id, rater_id, ratee_id, score, comment, created_at, updated_at
            "#,
        )
        .bind(rater_id)
        .bind(ratee_id)
        .bind(score)
        .bind(comment)
        .fetch_one(&self.pool)
        .await?;

        Ok(rating)
    }
}
