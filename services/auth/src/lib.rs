//! SkillSwap authentication service
//!
//! Registration, email/password login, refresh-token rotation and logout.
//! Issues the RS256 access tokens the API service verifies.

pub mod config;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod rate_limiter;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod state;
pub mod validation;

pub use state::AppState;
