//! Match request handlers

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
    models::match_request::{
        CreateMatchRequest, Decision, DecisionResponse, MatchRequestQuery, Transition,
    },
};

/// Send a match request
pub async fn create_match_request(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateMatchRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = state
        .match_request_repository
        .create(auth_user.id, payload.recipient_id)
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

/// List the caller's requests
pub async fn list_match_requests(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<MatchRequestQuery>,
) -> ApiResult<impl IntoResponse> {
    let requests = state
        .match_request_repository
        .list_for(auth_user.id, &query)
        .await
        .map_err(|e| ApiError::internal("Failed to get match requests", e))?;

    Ok(Json(requests))
}

/// Get one of the caller's requests
pub async fn get_match_request(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let request = state
        .match_request_repository
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Match request"))?;

    if !request.involves(auth_user.id) {
        return Err(ApiError::Forbidden(
            "You are not part of this match request".to_string(),
        ));
    }

    Ok(Json(request))
}

async fn decide(
    state: &AppState,
    auth_user: &AuthUser,
    id: i64,
    decision: Decision,
) -> ApiResult<DecisionResponse> {
    let (request, transition) = state
        .match_request_repository
        .decide(id, auth_user.id, decision)
        .await?;

    Ok(DecisionResponse {
        request,
        changed: transition != Transition::NoOp,
    })
}

/// Accept a request addressed to the caller
pub async fn accept_match_request(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(decide(&state, &auth_user, id, Decision::Accept).await?))
}

/// Reject a request addressed to the caller
pub async fn reject_match_request(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(decide(&state, &auth_user, id, Decision::Reject).await?))
}
