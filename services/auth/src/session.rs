//! Session management using Redis
//!
//! One session per user: the refresh token currently allowed to be exchanged.
//! Logging in again replaces it, so older refresh tokens stop working.

use anyhow::Result;
use common::cache::RedisPool;
use tracing::info;
use uuid::Uuid;

/// Session manager for handling user sessions in Redis
#[derive(Clone)]
pub struct SessionManager {
    redis_pool: RedisPool,
    ttl_seconds: u64,
}

fn session_key(user_id: Uuid) -> String {
    format!("session:{}", user_id)
}

impl SessionManager {
    /// Create a new session manager whose sessions live as long as a refresh token
    pub fn new(redis_pool: RedisPool, ttl_seconds: u64) -> Self {
        Self {
            redis_pool,
            ttl_seconds,
        }
    }

    /// Store `refresh_token` as the user's session, replacing any previous one
    pub async fn store_session(&self, user_id: Uuid, refresh_token: &str) -> Result<()> {
        info!("Storing session for user: {}", user_id);

        self.redis_pool
            .set(&session_key(user_id), refresh_token, Some(self.ttl_seconds))
            .await?;

        Ok(())
    }

    /// Delete a session for a user
    pub async fn delete_session(&self, user_id: Uuid) -> Result<()> {
        info!("Deleting session for user: {}", user_id);

        self.redis_pool.delete(&session_key(user_id)).await?;

        Ok(())
    }

    /// Check if a session exists and matches `refresh_token`
    pub async fn is_session_valid(&self, user_id: Uuid, refresh_token: &str) -> Result<bool> {
        let stored_token = self.redis_pool.get(&session_key(user_id)).await?;

        Ok(stored_token.as_deref() == Some(refresh_token))
    }

    /// Get Redis health status
    pub async fn health_check(&self) -> Result<bool> {
        Ok(self.redis_pool.health_check().await?)
    }
}
