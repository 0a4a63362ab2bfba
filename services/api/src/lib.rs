//! SkillSwap API service
//!
//! Profiles, skills, match requests, notifications and chat, behind bearer
//! tokens issued by the auth service.

pub mod compatibility;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod notifier;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod stream;
pub mod validation;

pub use state::AppState;
