//! Profile, search, compatibility and rating handlers

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    AppState,
    compatibility::{CompatibleUser, rank_candidates},
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::{
        PageQuery, Paginated,
        user::{RatingRequest, SearchQuery, UpdateProfileRequest, UserRecord, UserResponse, UserSummary},
    },
    validation::{contains_pattern, validate_name, validate_score, validate_search_term},
};

/// Trim an optional text field, storing blanks as NULL
fn optional_text(value: Option<Option<String>>) -> Option<Option<String>> {
    value.map(|inner| {
        inner
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

fn normalize_profile(mut update: UpdateProfileRequest) -> ApiResult<UpdateProfileRequest> {
    if let Some(first_name) = update.first_name.as_deref() {
        update.first_name =
            Some(validate_name(first_name).map_err(|e| ApiError::validation("first_name", e))?);
    }
    if let Some(last_name) = update.last_name.as_deref() {
        update.last_name =
            Some(validate_name(last_name).map_err(|e| ApiError::validation("last_name", e))?);
    }
    if let Some(Some(year)) = update.year {
        if year < 1 {
            return Err(ApiError::validation("year", "Year must be positive"));
        }
    }
    update.middle_name = optional_text(update.middle_name);
    update.phone = optional_text(update.phone);

    Ok(update)
}

async fn load_user(state: &AppState, id: Uuid) -> ApiResult<UserRecord> {
    state
        .user_repository
        .find_by_id(id)
        .await
        .map_err(|e| ApiError::internal("Failed to get user", e))?
        .ok_or_else(|| ApiError::not_found("User"))
}

async fn profile_response(state: &AppState, user: UserRecord) -> ApiResult<UserResponse> {
    let (known, desired) = state
        .user_repository
        .skills_of(user.id)
        .await
        .map_err(|e| ApiError::internal("Failed to get user skills", e))?;

    Ok(UserResponse::new(user, known, desired))
}

/// List all users (staff only)
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    auth_user.require_staff()?;

    let (users, total) = state
        .user_repository
        .list(&page)
        .await
        .map_err(|e| ApiError::internal("Failed to get users", e))?;

    let items = users.iter().map(UserSummary::from).collect();
    Ok(Json(Paginated::new(items, &page, total)))
}

/// Get the caller's profile
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let user = load_user(&state, auth_user.id).await?;
    Ok(Json(profile_response(&state, user).await?))
}

/// Update the caller's profile
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let update = normalize_profile(payload)?;

    let user = state
        .user_repository
        .update_profile(auth_user.id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(profile_response(&state, user).await?))
}

/// Users the caller is matched with
pub async fn my_matches(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let users = state
        .user_repository
        .matches_of(auth_user.id)
        .await
        .map_err(|e| ApiError::internal("Failed to get matches", e))?;

    Ok(Json(users.iter().map(UserSummary::from).collect::<Vec<_>>()))
}

/// Search users by name or skill
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let term = validate_search_term(&query.q).map_err(|e| ApiError::validation("q", e))?;

    let users = state
        .user_repository
        .search(&contains_pattern(&term))
        .await
        .map_err(|e| ApiError::internal("Failed to search users", e))?;

    Ok(Json(users.iter().map(UserSummary::from).collect::<Vec<_>>()))
}

/// Rank other users by how well their skills complement the caller's
pub async fn compatible_users(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let me = state
        .user_repository
        .skill_profile(auth_user.id)
        .await
        .map_err(|e| ApiError::internal("Failed to get skill profile", e))?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let ranked = if me.is_empty() {
        Vec::new()
    } else {
        let candidates = state
            .user_repository
            .candidate_profiles(auth_user.id)
            .await
            .map_err(|e| ApiError::internal("Failed to get candidates", e))?;
        rank_candidates(&me, candidates)
    };

    let skills: HashMap<i64, _> = state
        .skill_repository
        .list(None)
        .await
        .map_err(|e| ApiError::internal("Failed to get skills", e))?
        .into_iter()
        .map(|skill| (skill.id, skill))
        .collect();

    let items = ranked
        .iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .map(|candidate| CompatibleUser::new(candidate, |id| skills.get(&id)))
        .collect();

    Ok(Json(Paginated::new(items, &page, ranked.len() as i64)))
}

/// Get any user's profile
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let user = load_user(&state, id).await?;
    Ok(Json(profile_response(&state, user).await?))
}

/// Rate another user; rating again replaces the previous score
pub async fn rate_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RatingRequest>,
) -> ApiResult<impl IntoResponse> {
    if id == auth_user.id {
        return Err(ApiError::validation("ratee_id", "You cannot rate yourself"));
    }
    validate_score(payload.score).map_err(|e| ApiError::validation("score", e))?;
    load_user(&state, id).await?;

    let comment = payload
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let rating = state
        .user_repository
        .rate(auth_user.id, id, payload.score, comment)
        .await
        .map_err(|e| ApiError::internal("Failed to save rating", e))?;

    Ok(Json(rating))
}
