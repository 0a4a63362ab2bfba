//! Skill directory handlers; writes are staff only

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::skill::{CategoryRequest, NewSkill, SkillQuery, UpdateSkill},
    validation::validate_name,
};

async fn ensure_category(state: &AppState, category_id: i64) -> ApiResult<()> {
    state
        .skill_repository
        .find_category(category_id)
        .await
        .map_err(|e| ApiError::internal("Failed to get category", e))?
        .map(|_| ())
        .ok_or_else(|| ApiError::validation("category_id", "Category not found"))
}

/// List skills
pub async fn list_skills(
    State(state): State<AppState>,
    Query(query): Query<SkillQuery>,
) -> ApiResult<impl IntoResponse> {
    let skills = state
        .skill_repository
        .list(query.category_id)
        .await
        .map_err(|e| ApiError::internal("Failed to get skills", e))?;

    Ok(Json(skills))
}

/// Get a skill by ID
pub async fn get_skill(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let skill = state
        .skill_repository
        .find(id)
        .await
        .map_err(|e| ApiError::internal("Failed to get skill", e))?
        .ok_or_else(|| ApiError::not_found("Skill"))?;

    Ok(Json(skill))
}

/// Create a skill
pub async fn create_skill(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<NewSkill>,
) -> ApiResult<impl IntoResponse> {
    auth_user.require_staff()?;

    let name = validate_name(&payload.name).map_err(|e| ApiError::validation("name", e))?;
    if let Some(category_id) = payload.category_id {
        ensure_category(&state, category_id).await?;
    }

    let skill = state
        .skill_repository
        .create(&name, payload.category_id)
        .await
        .map_err(|e| ApiError::internal("Failed to create skill", e))?;

    Ok((StatusCode::CREATED, Json(skill)))
}

/// Update a skill
pub async fn update_skill(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSkill>,
) -> ApiResult<impl IntoResponse> {
    auth_user.require_staff()?;

    let name = payload
        .name
        .as_deref()
        .map(validate_name)
        .transpose()
        .map_err(|e| ApiError::validation("name", e))?;
    if let Some(Some(category_id)) = payload.category_id {
        ensure_category(&state, category_id).await?;
    }

    let skill = state
        .skill_repository
        .update(id, name.as_deref(), payload.category_id)
        .await
        .map_err(|e| ApiError::internal("Failed to update skill", e))?
        .ok_or_else(|| ApiError::not_found("Skill"))?;

    Ok(Json(skill))
}

/// Delete a skill
pub async fn delete_skill(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    auth_user.require_staff()?;

    let deleted = state
        .skill_repository
        .delete(id)
        .await
        .map_err(|e| ApiError::internal("Failed to delete skill", e))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Skill"))
    }
}

/// List categories
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let categories = state
        .skill_repository
        .list_categories()
        .await
        .map_err(|e| ApiError::internal("Failed to get categories", e))?;

    Ok(Json(categories))
}

/// Get a category by ID
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let category = state
        .skill_repository
        .find_category(id)
        .await
        .map_err(|e| ApiError::internal("Failed to get category", e))?
        .ok_or_else(|| ApiError::not_found("Category"))?;

    Ok(Json(category))
}

/// Create a category
pub async fn create_category(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    auth_user.require_staff()?;

    let name = validate_name(&payload.name).map_err(|e| ApiError::validation("name", e))?;
    let category = state
        .skill_repository
        .create_category(&name)
        .await
        .map_err(|e| ApiError::internal("Failed to create category", e))?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// Rename a category
pub async fn update_category(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<CategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    auth_user.require_staff()?;

    let name = validate_name(&payload.name).map_err(|e| ApiError::validation("name", e))?;
    let category = state
        .skill_repository
        .rename_category(id, &name)
        .await
        .map_err(|e| ApiError::internal("Failed to update category", e))?
        .ok_or_else(|| ApiError::not_found("Category"))?;

    Ok(Json(category))
}

/// Delete a category
pub async fn delete_category(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    auth_user.require_staff()?;

    let deleted = state
        .skill_repository
        .delete_category(id)
        .await
        .map_err(|e| ApiError::internal("Failed to delete category", e))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Category"))
    }
}
