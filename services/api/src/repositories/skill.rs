//! Skill and skill category repository

use anyhow::Result;
use sqlx::PgPool;

use crate::models::skill::{Skill, SkillCategory};

/// Skill repository for database operations
#[derive(Clone)]
pub struct SkillRepository {
    pool: PgPool,
}

impl SkillRepository {
    /// Create a new skill repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List skills, optionally restricted to one category
    pub async fn list(&self, category_id: Option<i64>) -> Result<Vec<Skill>> {
        let skills = sqlx::query_as::<_, Skill>(
            r#"
            SELECT s.id, s.name, s.category_id, c.name AS category_name
            FROM skills s
            LEFT JOIN skill_categories c ON c.id = s.category_id
            WHERE $1::bigint IS NULL OR s.category_id = $1
            ORDER BY s.name, s.id
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(skills)
    }

    /// Find a skill by ID
    pub async fn find(&self, id: i64) -> Result<Option<Skill>> {
        let skill = sqlx::query_as::<_, Skill>(
            r#"
            SELECT s.id, s.name, s.category_id, c.name AS category_name
            FROM skills s
            LEFT JOIN skill_categories c ON c.id = s.category_id
            WHERE s.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(skill)
    }

    /// Create a skill
    pub async fn create(&self, name: &str, category_id: Option<i64>) -> Result<Skill> {
        let skill = sqlx::query_as::<_, Skill>(
            r#"
            WITH inserted AS (
                INSERT INTO skills (name, category_id)
                VALUES ($1, $2)
                RETURNING id, name, category_id
            )
            SELECT i.id, i.name, i.category_id, c.name AS category_name
            FROM inserted i
            LEFT JOIN skill_categories c ON c.id = i.category_id
            "#,
        )
        .bind(name)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(skill)
    }

    /// Rename a skill and/or move it to another category.
    ///
    /// `category_id` of `Some(None)` detaches the skill from its category.
    pub async fn update(
        &self,
        id: i64,
        name: Option<&str>,
        category_id: Option<Option<i64>>,
    ) -> Result<Option<Skill>> {
        let skill = sqlx::query_as::<_, Skill>(
            r#"
            WITH updated AS (
                UPDATE skills SET
                    name = COALESCE($2, name),
                    category_id = CASE WHEN $3 THEN $4 ELSE category_id END
                WHERE id = $1
                RETURNING id, name, category_id
            )
            SELECT u.id, u.name, u.category_id, c.name AS category_name
            FROM updated u
            LEFT JOIN skill_categories c ON c.id = u.category_id
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(category_id.is_some())
        .bind(category_id.flatten())
        .fetch_optional(&self.pool)
        .await?;

        Ok(skill)
    }

    /// Delete a skill; returns false when it did not exist
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM skills WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all categories
    pub async fn list_categories(&self) -> Result<Vec<SkillCategory>> {
        let categories = sqlx::query_as::<_, SkillCategory>(
            "SELECT id, name FROM skill_categories ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Find a category by ID
    pub async fn find_category(&self, id: i64) -> Result<Option<SkillCategory>> {
        let category = sqlx::query_as::<_, SkillCategory>(
            "SELECT id, name FROM skill_categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Create a category
    pub async fn create_category(&self, name: &str) -> Result<SkillCategory> {
        let category = sqlx::query_as::<_, SkillCategory>(
            "INSERT INTO skill_categories (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    /// Rename a category
    pub async fn rename_category(&self, id: i64, name: &str) -> Result<Option<SkillCategory>> {
        let category = sqlx::query_as::<_, SkillCategory>(
            "UPDATE skill_categories SET name = $2 WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Delete a category; its skills are kept without a category
    pub async fn delete_category(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM skill_categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
