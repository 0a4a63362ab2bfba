//! Shared application state

use common::cache::RedisPool;
use sqlx::PgPool;

use crate::{
    jwt::JwtService,
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::UserRepository,
    session::SessionManager,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub redis_pool: RedisPool,
    pub jwt_service: JwtService,
    pub session_manager: SessionManager,
    pub user_repository: UserRepository,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        db_pool: PgPool,
        redis_pool: RedisPool,
        jwt_service: JwtService,
        rate_limiter_config: RateLimiterConfig,
    ) -> Self {
        let session_manager =
            SessionManager::new(redis_pool.clone(), jwt_service.refresh_token_expiry());

        Self {
            user_repository: UserRepository::new(db_pool),
            rate_limiter: RateLimiter::new(rate_limiter_config),
            redis_pool,
            jwt_service,
            session_manager,
        }
    }
}
