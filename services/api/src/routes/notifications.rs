//! Notification handlers

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::notification::{NotificationQuery, UpdateNotification},
};

/// List the caller's notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<impl IntoResponse> {
    let notifications = state
        .notification_repository
        .list_for(auth_user.id, query.include_hidden)
        .await
        .map_err(|e| ApiError::internal("Failed to get notifications", e))?;

    Ok(Json(notifications))
}

/// Mark one of the caller's notifications read or hidden
pub async fn update_notification(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateNotification>,
) -> ApiResult<impl IntoResponse> {
    let notification = state
        .notification_repository
        .find(id)
        .await
        .map_err(|e| ApiError::internal("Failed to get notification", e))?
        .ok_or_else(|| ApiError::not_found("Notification"))?;

    if notification.user_id != auth_user.id {
        return Err(ApiError::Forbidden(
            "You can only update your own notifications".to_string(),
        ));
    }

    let notification = state
        .notification_repository
        .update(id, auth_user.id, &payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification"))?;

    Ok(Json(notification))
}
