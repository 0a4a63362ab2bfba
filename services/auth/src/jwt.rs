//! JWT service for token generation, validation, and management
//!
//! Tokens are signed with RS256. The API service only holds the public key, so
//! everything it needs to authorize a request travels in the access token: the
//! user id and the `staff` role for staff accounts. Refresh tokens are rotated
//! on use and revoked ones are blacklisted in Redis until they expire.

use anyhow::Result;
use common::cache::RedisPool;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::models::User;

/// Role carried by access tokens of staff accounts
pub const STAFF_ROLE: &str = "staff";

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Private key for signing tokens
    pub private_key: String,
    /// Public key for verifying tokens
    pub public_key: String,
    /// Access token expiration time in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_PRIVATE_KEY`: Private key for signing tokens (PEM format) or path to private key file
    /// - `JWT_PUBLIC_KEY`: Public key for verifying tokens (PEM format) or path to public key file
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 900)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let private_key = read_key("JWT_PRIVATE_KEY")?;
        let public_key = read_key("JWT_PUBLIC_KEY")?;

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(900);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(604800);

        Ok(JwtConfig {
            private_key,
            public_key,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}

/// Read a PEM key from `var`, either inline or from a file path.
/// Relative paths are tried against the working directory, then the crate root.
fn read_key(var: &str) -> Result<String> {
    let value =
        std::env::var(var).map_err(|_| anyhow::anyhow!("{} environment variable not set", var))?;

    if value.starts_with("-----BEGIN") {
        return Ok(value);
    }

    let contents = std::fs::read_to_string(&value)
        .or_else(|_| {
            let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            path.push(&value);
            std::fs::read_to_string(path)
        })
        .map_err(|e| anyhow::anyhow!("Failed to read {} file {}: {}", var, value, e))?;

    Ok(contents.trim().to_string())
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// User roles
    pub roles: Vec<String>,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum TokenType {
    /// Access token
    Access,
    /// Refresh token
    Refresh,
}

fn now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
        .as_secs())
}

/// Roles granted to a user's access tokens
pub fn roles_for(user: &User) -> Vec<String> {
    if user.is_staff {
        vec![STAFF_ROLE.to_string()]
    } else {
        Vec::new()
    }
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(config.private_key.as_bytes())?;
        let decoding_key = DecodingKey::from_rsa_pem(config.public_key.as_bytes())?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        Ok(JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    fn sign(&self, user: &User, token_type: TokenType) -> Result<String> {
        let iat = now()?;
        let (roles, ttl) = match token_type {
            TokenType::Access => (roles_for(user), self.config.access_token_expiry),
            TokenType::Refresh => (Vec::new(), self.config.refresh_token_expiry),
        };

        let claims = Claims {
            sub: user.id,
            roles,
            iat,
            exp: iat + ttl,
            token_type,
        };

        Ok(encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Generate an access token for a user
    pub fn generate_access_token(&self, user: &User) -> Result<String> {
        self.sign(user, TokenType::Access)
    }

    /// Generate a refresh token for a user
    pub fn generate_refresh_token(&self, user: &User) -> Result<String> {
        self.sign(user, TokenType::Refresh)
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Check if a token is blacklisted in Redis
    pub async fn is_token_blacklisted(&self, redis_pool: &RedisPool, token: &str) -> Result<bool> {
        let key = format!("blacklisted_token:{}", token);
        let result = redis_pool.get(&key).await?;
        Ok(result.is_some())
    }

    /// Blacklist a token in Redis for its remaining lifetime
    pub async fn blacklist_token(&self, redis_pool: &RedisPool, claims: &Claims, token: &str) -> Result<()> {
        let expiry = claims.exp.saturating_sub(now()?);
        if expiry == 0 {
            return Ok(());
        }

        let key = format!("blacklisted_token:{}", token);
        redis_pool.set(&key, "1", Some(expiry)).await?;
        Ok(())
    }

    /// Get the access token expiry time
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    /// Get the refresh token expiry time
    pub fn refresh_token_expiry(&self) -> u64 {
        self.config.refresh_token_expiry
    }

    /// Rotate a refresh token
    ///
    /// Blacklists the old refresh token and generates a new one
    pub async fn rotate_refresh_token(
        &self,
        redis_pool: &RedisPool,
        user: &User,
        old_refresh_token: &str,
    ) -> Result<String> {
        let claims = self.validate_token(old_refresh_token)?;

        if claims.token_type != TokenType::Refresh {
            return Err(anyhow::anyhow!("Token is not a refresh token"));
        }

        if claims.sub != user.id {
            return Err(anyhow::anyhow!("Token does not belong to user"));
        }

        self.blacklist_token(redis_pool, &claims, old_refresh_token)
            .await?;

        self.generate_refresh_token(user)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) const PRIVATE_KEY: &str = include_str!("../../../testdata/jwt_private.pem");
    pub(crate) const PUBLIC_KEY: &str = include_str!("../../../testdata/jwt_public.pem");

    pub(crate) fn test_service() -> JwtService {
        JwtService::new(JwtConfig {
            private_key: PRIVATE_KEY.to_string(),
            public_key: PUBLIC_KEY.to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 3600,
        })
        .unwrap()
    }

    pub(crate) fn test_user(is_staff: bool) -> User {
        User {
            id: Uuid::new_v4(),
            email: "ana@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Ana".to_string(),
            middle_name: None,
            last_name: "Rojas".to_string(),
            year: Some(3),
            phone: None,
            is_staff,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_access_token_carries_roles() {
        let service = test_service();

        let staff = test_user(true);
        let claims = service
            .validate_token(&service.generate_access_token(&staff).unwrap())
            .unwrap();
        assert_eq!(claims.sub, staff.id);
        assert_eq!(claims.roles, vec![STAFF_ROLE.to_string()]);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 900);

        let student = test_user(false);
        let claims = service
            .validate_token(&service.generate_access_token(&student).unwrap())
            .unwrap();
        assert!(claims.roles.is_empty());
    }

    #[test]
    fn test_refresh_token_has_no_roles() {
        let service = test_service();
        let user = test_user(true);

        let claims = service
            .validate_token(&service.generate_refresh_token(&user).unwrap())
            .unwrap();
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert!(claims.roles.is_empty());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let service = test_service();
        let student = service.generate_access_token(&test_user(false)).unwrap();
        let staff = service.generate_access_token(&test_user(true)).unwrap();

        // Staff claims under the student's signature
        let student_parts: Vec<&str> = student.split('.').collect();
        let staff_parts: Vec<&str> = staff.split('.').collect();
        let forged = format!(
            "{}.{}.{}",
            student_parts[0], staff_parts[1], student_parts[2]
        );

        assert!(service.validate_token(&forged).is_err());
        assert!(service.validate_token("not-a-token").is_err());
    }
}
