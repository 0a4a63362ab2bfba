//! Shared infrastructure for the SkillSwap services
//!
//! Database pooling and schema migrations, the Redis cache used for sessions
//! and token blacklisting, and the error types those layers produce.

pub mod cache;
pub mod database;
pub mod error;
