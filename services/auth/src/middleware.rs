//! Middleware for JWT token validation and authentication

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::debug;
use uuid::Uuid;

use crate::{
    AppState,
    error::AuthError,
    jwt::{Claims, TokenType},
};

/// The caller of a protected route, with the access token it presented
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub access_token: String,
    pub claims_exp: u64,
}

impl CurrentUser {
    /// Claims to blacklist the presented access token with
    pub fn access_claims(&self) -> Claims {
        Claims {
            sub: self.id,
            roles: Vec::new(),
            iat: 0,
            exp: self.claims_exp,
            token_type: TokenType::Access,
        }
    }
}

/// Extract and validate the access token from the Authorization header
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AuthError::Unauthorized)?
        .token()
        .to_string();

    let claims = state.jwt_service.validate_token(&token).map_err(|e| {
        debug!("Rejected token: {}", e);
        AuthError::Unauthorized
    })?;

    if claims.token_type != TokenType::Access {
        return Err(AuthError::Unauthorized);
    }

    let is_blacklisted = state
        .jwt_service
        .is_token_blacklisted(&state.redis_pool, &token)
        .await
        .map_err(|e| AuthError::internal("Failed to check if token is blacklisted", e))?;

    if is_blacklisted {
        return Err(AuthError::Unauthorized);
    }

    req.extensions_mut().insert(CurrentUser {
        id: claims.sub,
        access_token: token,
        claims_exp: claims.exp,
    });

    Ok(next.run(req).await)
}
