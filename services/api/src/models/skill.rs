//! Skill directory models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::double_option;

/// Skill category entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SkillCategory {
    pub id: i64,
    pub name: String,
}

/// Skill entity joined with its category name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Skill {
    pub id: i64,
    pub name: String,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
}

/// Payload for creating or renaming a category
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

/// Payload for creating a skill
#[derive(Debug, Clone, Deserialize)]
pub struct NewSkill {
    pub name: String,
    pub category_id: Option<i64>,
}

/// Partial update for a skill; `"category_id": null` detaches the category
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSkill {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
}

/// Query parameters for skill listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillQuery {
    /// Filter by category
    pub category_id: Option<i64>,
}
