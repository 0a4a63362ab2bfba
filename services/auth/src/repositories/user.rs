//! User repository for database operations

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    models::{NewUser, User},
};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, middle_name, last_name, \
                            year, phone, is_staff, created_at, updated_at";

/// Hash a password with argon2 and a fresh salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string())
}

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user. The payload is expected to be validated and normalized.
    pub async fn create(&self, new_user: &NewUser) -> AuthResult<User> {
        info!("Creating new user: {}", new_user.email);

        let password_hash = hash_password(&new_user.password)
            .map_err(|e| AuthError::internal("Failed to hash password", e))?;

        let result = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, middle_name, last_name, year, phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.middle_name)
        .bind(&new_user.last_name)
        .bind(new_user.year)
        .bind(&new_user.phone)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                AuthError::validation("email", "An account with this email already exists"),
            ),
            Err(e) => Err(AuthError::internal("Failed to create user", e)),
        }
    }

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Verify a user's password
    pub fn verify_password(&self, user: &User, password: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::tests::test_user;

    #[tokio::test]
    async fn test_password_hash_round_trip() {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/skillswap").unwrap();
        let repository = UserRepository::new(pool);

        let mut user = test_user(false);
        user.password_hash = hash_password("Sw4pSkills").unwrap();

        assert!(user.password_hash.starts_with("$argon2"));
        assert!(repository.verify_password(&user, "Sw4pSkills").unwrap());
        assert!(!repository.verify_password(&user, "sw4pskills").unwrap());

        user.password_hash = "not-a-hash".to_string();
        assert!(repository.verify_password(&user, "Sw4pSkills").is_err());
    }
}
