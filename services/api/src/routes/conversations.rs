//! Conversation, message and message stream handlers

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Sse},
};
use futures::StreamExt;
use std::convert::Infallible;
use tracing::info;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::conversation::{
        Conversation, CreateConversationRequest, MessagesQuery, SendMessageRequest, StreamQuery,
        check_read_access, check_write_access,
    },
    stream::{StreamViewer, message_stream},
    validation::{normalize_message_content, parse_since},
};

async fn load_conversation(state: &AppState, id: i64) -> ApiResult<Conversation> {
    state
        .conversation_repository
        .find(id)
        .await
        .map_err(|e| ApiError::internal("Failed to get conversation", e))?
        .ok_or_else(|| ApiError::not_found("Conversation"))
}

/// Membership plus a match with every other participant
async fn authorize_write(
    state: &AppState,
    conversation: &Conversation,
    auth_user: &AuthUser,
) -> ApiResult<()> {
    check_read_access(conversation, auth_user.id)?;

    let matched = state
        .conversation_repository
        .matched_partners(conversation, auth_user.id)
        .await
        .map_err(|e| ApiError::internal("Failed to check matches", e))?;

    check_write_access(conversation, auth_user.id, &matched)?;
    Ok(())
}

/// Cursor sent back by a reconnecting `EventSource`
fn last_event_id(headers: &HeaderMap) -> Option<i64> {
    headers
        .get("last-event-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Start a conversation
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateConversationRequest>,
) -> ApiResult<impl IntoResponse> {
    let participants = payload
        .participants
        .into_ids()
        .map_err(|e| ApiError::validation("participants", e))?;

    let conversation = state
        .conversation_repository
        .create(auth_user.id, participants)
        .await?;

    info!(
        "Conversation {} created by {}",
        conversation.id, auth_user.id
    );

    Ok((StatusCode::CREATED, Json(conversation)))
}

/// List the caller's conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let conversations = state
        .conversation_repository
        .list_for(auth_user.id)
        .await
        .map_err(|e| ApiError::internal("Failed to get conversations", e))?;

    Ok(Json(conversations))
}

/// Get a conversation the caller takes part in
pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let conversation = load_conversation(&state, id).await?;
    check_read_access(&conversation, auth_user.id)?;

    Ok(Json(conversation))
}

/// List messages, optionally only those sent after `since`
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<impl IntoResponse> {
    let conversation = load_conversation(&state, id).await?;
    check_read_access(&conversation, auth_user.id)?;

    let since = query
        .since
        .as_deref()
        .map(|raw| parse_since(raw, state.time_zone))
        .transpose()
        .map_err(|e| ApiError::validation("since", e))?;

    let messages = state
        .conversation_repository
        .messages(id, since)
        .await
        .map_err(|e| ApiError::internal("Failed to get messages", e))?;

    Ok(Json(messages))
}

/// Send a message and wake the conversation's open streams
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let conversation = load_conversation(&state, id).await?;
    authorize_write(&state, &conversation, &auth_user).await?;

    let content =
        normalize_message_content(&payload.content).map_err(|e| ApiError::validation("content", e))?;

    let message = state
        .conversation_repository
        .insert_message(id, auth_user.id, &content)
        .await
        .map_err(|e| ApiError::internal("Failed to send message", e))?;

    state.message_hub.publish(id, message.id).await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Server-sent event stream of a conversation's messages
///
/// Resumes after `last_id`, or after the `Last-Event-ID` header when the
/// query parameter is absent.
pub async fn stream_messages(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let conversation = load_conversation(&state, id).await?;
    authorize_write(&state, &conversation, &auth_user).await?;

    let cursor = query
        .last_id
        .or_else(|| last_event_id(&headers))
        .unwrap_or(0);

    // Subscribe before the first read so no publish slips between them
    let wakeups = state.message_hub.subscribe(id).await;

    info!(
        "Opening message stream for conversation {} (user {}, after {})",
        id, auth_user.id, cursor
    );

    let viewer = StreamViewer {
        user_id: auth_user.id,
        expires_at: auth_user.expires_at,
    };

    let events = message_stream(
        state.conversation_repository.clone(),
        id,
        viewer,
        cursor,
        wakeups,
        state.stream_settings,
    )
    .map(|item| Ok::<_, Infallible>(item.into_event()));

    Ok((
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(events),
    ))
}
