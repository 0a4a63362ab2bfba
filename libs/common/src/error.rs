//! Custom error types for the common library
//!
//! This module defines the infrastructure errors shared by the services.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred while applying the schema migrations
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Error type for Redis cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// The Redis URL could not be parsed or the server refused the connection
    #[error("Cache connection error: {0}")]
    Connection(#[source] redis::RedisError),

    /// A command failed after the connection was established
    #[error("Cache command error: {0}")]
    Command(#[source] redis::RedisError),
}

/// Type alias for Result with CacheError
pub type CacheResult<T> = Result<T, CacheError>;
