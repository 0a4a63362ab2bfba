//! Application state shared across handlers

use chrono_tz::Tz;
use sqlx::PgPool;

use crate::{
    middleware::TokenVerifier,
    repositories::{
        ConversationRepository, MatchRequestRepository, NotificationRepository, SkillRepository,
        UserRepository,
    },
    stream::{MessageHub, StreamSettings},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub token_verifier: TokenVerifier,
    pub message_hub: MessageHub,
    pub stream_settings: StreamSettings,
    /// Zone for `since` timestamps without an offset
    pub time_zone: Tz,
    pub user_repository: UserRepository,
    pub skill_repository: SkillRepository,
    pub match_request_repository: MatchRequestRepository,
    pub notification_repository: NotificationRepository,
    pub conversation_repository: ConversationRepository,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        token_verifier: TokenVerifier,
        message_hub: MessageHub,
        stream_settings: StreamSettings,
        time_zone: Tz,
    ) -> Self {
        Self {
            user_repository: UserRepository::new(pool.clone()),
            skill_repository: SkillRepository::new(pool.clone()),
            match_request_repository: MatchRequestRepository::new(pool.clone()),
            notification_repository: NotificationRepository::new(pool.clone()),
            conversation_repository: ConversationRepository::new(pool),
            token_verifier,
            message_hub,
            stream_settings,
            time_zone,
        }
    }
}
