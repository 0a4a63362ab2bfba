//! Authentication service routes

use axum::{
    Extension, Json, Router, middleware,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    AppState,
    error::{AuthError, AuthResult},
    jwt::TokenType,
    middleware::{CurrentUser, auth_middleware},
    models::{LoginCredentials, NewUser, User, UserResponse},
    validation::{normalize_email, validate_email, validate_name, validate_password, validate_phone},
};

/// Response for token generation
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

/// Request for token refresh and logout
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// Trimmed text, or `None` when blank
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate a registration payload and normalize its fields
fn normalize_registration(payload: NewUser) -> AuthResult<NewUser> {
    let email = normalize_email(&payload.email);
    validate_email(&email).map_err(|e| AuthError::validation("email", e))?;
    validate_password(&payload.password).map_err(|e| AuthError::validation("password", e))?;
    validate_name(&payload.first_name).map_err(|e| AuthError::validation("first_name", e))?;
    validate_name(&payload.last_name).map_err(|e| AuthError::validation("last_name", e))?;

    let middle_name = optional_text(payload.middle_name);
    if let Some(middle_name) = &middle_name {
        validate_name(middle_name).map_err(|e| AuthError::validation("middle_name", e))?;
    }

    let phone = optional_text(payload.phone);
    if let Some(phone) = &phone {
        validate_phone(phone).map_err(|e| AuthError::validation("phone", e))?;
    }

    if matches!(payload.year, Some(year) if year < 1) {
        return Err(AuthError::validation("year", "Year must be at least 1"));
    }

    Ok(NewUser {
        email,
        password: payload.password,
        first_name: payload.first_name.trim().to_string(),
        middle_name,
        last_name: payload.last_name.trim().to_string(),
        year: payload.year,
        phone,
    })
}

/// Issue a fresh token pair and make the refresh token the user's session
async fn issue_tokens(state: &AppState, user: User) -> AuthResult<TokenResponse> {
    let access_token = state
        .jwt_service
        .generate_access_token(&user)
        .map_err(|e| AuthError::internal("Failed to generate access token", e))?;

    let refresh_token = state
        .jwt_service
        .generate_refresh_token(&user)
        .map_err(|e| AuthError::internal("Failed to generate refresh token", e))?;

    state
        .session_manager
        .store_session(user.id, &refresh_token)
        .await
        .map_err(|e| AuthError::internal("Failed to store session in Redis", e))?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.access_token_expiry(),
        user: user.into(),
    })
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> AuthResult<impl IntoResponse> {
    let new_user = normalize_registration(payload)?;
    let user = state.user_repository.create(&new_user).await?;

    info!("Registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginCredentials>,
) -> AuthResult<impl IntoResponse> {
    let email = normalize_email(&payload.email);

    if !state.rate_limiter.is_allowed(&email).await {
        warn!("Login throttled for {}", email);
        return Err(AuthError::TooManyRequests);
    }

    let user = state
        .user_repository
        .find_by_email(&email)
        .await
        .map_err(|e| AuthError::internal("Failed to load user", e))?
        .ok_or(AuthError::Unauthorized)?;

    let valid = state
        .user_repository
        .verify_password(&user, &payload.password)
        .map_err(|e| AuthError::internal("Failed to verify password", e))?;

    if !valid {
        return Err(AuthError::Unauthorized);
    }

    state.rate_limiter.reset(&email).await;
    info!("User {} logged in", user.id);

    Ok(Json(issue_tokens(&state, user).await?))
}

/// Refresh token endpoint
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AuthResult<impl IntoResponse> {
    let claims = state
        .jwt_service
        .validate_token(&payload.refresh_token)
        .map_err(|_| AuthError::Unauthorized)?;

    if claims.token_type != TokenType::Refresh {
        return Err(AuthError::Unauthorized);
    }

    let is_blacklisted = state
        .jwt_service
        .is_token_blacklisted(&state.redis_pool, &payload.refresh_token)
        .await
        .map_err(|e| AuthError::internal("Failed to check if token is blacklisted", e))?;

    let is_current = state
        .session_manager
        .is_session_valid(claims.sub, &payload.refresh_token)
        .await
        .map_err(|e| AuthError::internal("Failed to read session", e))?;

    if is_blacklisted || !is_current {
        return Err(AuthError::Unauthorized);
    }

    // Roles are re-read so staff changes apply on the next refresh
    let user = state
        .user_repository
        .find_by_id(claims.sub)
        .await
        .map_err(|e| AuthError::internal("Failed to load user", e))?
        .ok_or(AuthError::Unauthorized)?;

    let access_token = state
        .jwt_service
        .generate_access_token(&user)
        .map_err(|e| AuthError::internal("Failed to generate access token", e))?;

    let refresh_token = state
        .jwt_service
        .rotate_refresh_token(&state.redis_pool, &user, &payload.refresh_token)
        .await
        .map_err(|e| AuthError::internal("Failed to rotate refresh token", e))?;

    state
        .session_manager
        .store_session(user.id, &refresh_token)
        .await
        .map_err(|e| AuthError::internal("Failed to update session in Redis", e))?;

    Ok(Json(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.access_token_expiry(),
        user: user.into(),
    }))
}

/// Logout endpoint: revokes the presented access token, the refresh token and the session
pub async fn logout(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AuthResult<impl IntoResponse> {
    let claims = state
        .jwt_service
        .validate_token(&payload.refresh_token)
        .map_err(|_| AuthError::Unauthorized)?;

    if claims.token_type != TokenType::Refresh || claims.sub != current_user.id {
        return Err(AuthError::Unauthorized);
    }

    state
        .jwt_service
        .blacklist_token(&state.redis_pool, &claims, &payload.refresh_token)
        .await
        .map_err(|e| AuthError::internal("Failed to blacklist refresh token", e))?;

    state
        .jwt_service
        .blacklist_token(
            &state.redis_pool,
            &current_user.access_claims(),
            &current_user.access_token,
        )
        .await
        .map_err(|e| AuthError::internal("Failed to blacklist access token", e))?;

    state
        .session_manager
        .delete_session(current_user.id)
        .await
        .map_err(|e| AuthError::internal("Failed to remove session from Redis", e))?;

    info!("User {} logged out", current_user.id);

    Ok(Json(serde_json::json!({"message": "Logged out successfully"})))
}

/// Current user endpoint
pub async fn me(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AuthResult<impl IntoResponse> {
    let user = state
        .user_repository
        .find_by_id(current_user.id)
        .await
        .map_err(|e| AuthError::internal("Failed to load user", e))?
        .ok_or(AuthError::Unauthorized)?;

    Ok(Json(UserResponse::from(user)))
}
