//! User profile models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{double_option, skill::Skill};

/// User row as stored in the `users` table, minus the password hash
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub year: Option<i32>,
    pub phone: Option<String>,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Name shown in notification titles and search results
    pub fn display_name(&self) -> String {
        match self.middle_name.as_deref().filter(|m| !m.is_empty()) {
            Some(middle) => format!("{} {} {}", self.first_name, middle, self.last_name),
            None => format!("{} {}", self.first_name, self.last_name),
        }
    }

    /// Click-to-chat link built from the digits of the phone number
    pub fn whatsapp_link(&self) -> Option<String> {
        let digits: String = self
            .phone
            .as_deref()?
            .chars()
            .filter(char::is_ascii_digit)
            .collect();

        if digits.is_empty() {
            None
        } else {
            Some(format!("https://wa.me/{}", digits))
        }
    }
}

/// Full profile response
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub year: Option<i32>,
    pub phone: Option<String>,
    pub whatsapp_link: Option<String>,
    pub known_skills: Vec<Skill>,
    pub desired_skills: Vec<Skill>,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn new(user: UserRecord, known_skills: Vec<Skill>, desired_skills: Vec<Skill>) -> Self {
        let whatsapp_link = user.whatsapp_link();
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            middle_name: user.middle_name,
            last_name: user.last_name,
            year: user.year,
            phone: user.phone,
            whatsapp_link,
            known_skills,
            desired_skills,
            created_at: user.created_at,
        }
    }
}

/// Compact user representation for listings
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub year: Option<i32>,
}

impl From<&UserRecord> for UserSummary {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name(),
            email: user.email.clone(),
            year: user.year,
        }
    }
}

/// Partial update of the caller's own profile
///
/// Skill lists replace the stored sets when present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub middle_name: Option<Option<String>>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub year: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    pub known_skills: Option<Vec<i64>>,
    pub desired_skills: Option<Vec<i64>>,
}

/// Query parameters for free-text user search
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Request for rating another user
#[derive(Debug, Clone, Deserialize)]
pub struct RatingRequest {
    pub score: i16,
    pub comment: Option<String>,
}

/// Stored rating
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Rating {
    pub id: i64,
    pub rater_id: Uuid,
    pub ratee_id: Uuid,
    pub score: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
