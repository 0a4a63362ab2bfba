//! Repositories for database operations

pub mod conversation;
pub mod match_request;
pub mod notification;
pub mod skill;
pub mod user;

pub use conversation::ConversationRepository;
pub use match_request::MatchRequestRepository;
pub use notification::NotificationRepository;
pub use skill::SkillRepository;
pub use user::UserRepository;
