//! Notification models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    MatchRequest,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::MatchRequest => "match_request",
        }
    }
}

/// Notification entity
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: Uuid,
    pub request_id: i64,
    pub kind: String,
    pub title: String,
    pub read: bool,
    pub visible: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification about to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub request_id: i64,
    pub kind: NotificationKind,
    pub title: String,
}

/// Partial update of a notification by its owner
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNotification {
    pub read: Option<bool>,
    pub visible: Option<bool>,
}

/// Query parameters for notification listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    /// Include notifications hidden after their request was resolved
    #[serde(default)]
    pub include_hidden: bool,
}
