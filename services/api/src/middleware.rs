//! Authentication middleware for JWT token validation

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::{env, sync::Arc};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::ApiError;

/// Role granting access to staff-only endpoints
pub const STAFF_ROLE: &str = "staff";

/// JWT claims structure, as issued by the auth service
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

/// Authenticated user information
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub roles: Vec<String>,
    /// When the presented access token stops being valid
    pub expires_at: DateTime<Utc>,
}

impl AuthUser {
    pub fn is_staff(&self) -> bool {
        self.roles.iter().any(|role| role == STAFF_ROLE)
    }

    /// Fail with 403 unless the user is staff
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Staff only".to_string()))
        }
    }
}

/// Verifies access tokens with the auth service's public key
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl TokenVerifier {
    /// Build a verifier from an RSA public key in PEM format
    pub fn from_rsa_pem(public_key: &str) -> anyhow::Result<Self> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key.as_bytes())?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        Ok(Self {
            decoding_key: Arc::new(decoding_key),
            validation: Arc::new(validation),
        })
    }

    /// Create a verifier from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_PUBLIC_KEY`: Public key (PEM format) or path to a PEM file
    pub fn from_env() -> anyhow::Result<Self> {
        let public_key = env::var("JWT_PUBLIC_KEY")
            .map_err(|_| anyhow::anyhow!("JWT_PUBLIC_KEY environment variable not set"))?;

        // If the public key looks like a file path, read from file (try CWD, then project root)
        let public_key = if public_key.starts_with("-----BEGIN") {
            public_key
        } else {
            std::fs::read_to_string(&public_key)
                .or_else(|_| {
                    let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
                    path.push(&public_key);
                    std::fs::read_to_string(path)
                })
                .map_err(|e| anyhow::anyhow!("Failed to read public key file: {}", e))?
                .trim()
                .to_string()
        };

        Self::from_rsa_pem(&public_key)
    }

    /// Validate an access token and return the user it belongs to
    pub fn verify(&self, token: &str) -> Result<AuthUser, ApiError> {
        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!("Rejected token: {}", e);
                ApiError::Unauthorized
            })?;

        // Refresh tokens only work against the auth service
        if token_data.claims.token_type != TokenType::Access {
            return Err(ApiError::Unauthorized);
        }

        let expires_at = i64::try_from(token_data.claims.exp)
            .ok()
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
            .ok_or(ApiError::Unauthorized)?;

        Ok(AuthUser {
            id: token_data.claims.sub,
            roles: token_data.claims.roles,
            expires_at,
        })
    }
}

/// Authentication middleware
///
/// Resolves the bearer token into an [`AuthUser`] request extension.
pub async fn auth_middleware(
    State(verifier): State<TokenVerifier>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized)?;

    let user = verifier.verify(bearer.token())?;
    if user.id.is_nil() {
        error!("Token with nil subject passed signature validation");
        return Err(ApiError::Unauthorized);
    }

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
