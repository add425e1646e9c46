use crate::api::AppState;
use crate::api::middleware::RequestMeta;
use crate::api::schemas::messages::{
    CountResponse, CreateMessageRequest, CreateMessageResponse, DeleteAllQuery, DeleteAllResponse,
    DeleteMessageResponse, ListMessagesQuery, ListMessagesResponse, MessageResponse,
};
use crate::domain::message::MessageId;
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};

/// Stores a message posted as `{"message": "..."}`.
///
/// # Errors
/// Returns `AppError::Validation` if the body is malformed or the message is blank.
/// Returns `AppError::Storage` if the message cannot be stored.
pub async fn create_message(
    State(state): State<AppState>,
    RequestMeta(meta): RequestMeta,
    payload: std::result::Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<Json<CreateMessageResponse>> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let raw = request.message.ok_or_else(|| AppError::Validation("message is required".to_string()))?;

    let message = state.message_service.create(&raw, meta).await?;
    let length = message.content.chars().count();

    Ok(Json(CreateMessageResponse { success: true, message: message.into(), length }))
}

/// Lists messages, newest first. At most `list_max_limit` messages are returned,
/// including when no `limit` is given.
///
/// # Errors
/// Returns `AppError::Validation` if `limit` is not a non-negative integer.
/// Returns `AppError::Storage` if the query fails.
pub async fn list_messages(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListMessagesQuery>, QueryRejection>,
) -> Result<Json<ListMessagesResponse>> {
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;

    let messages: Vec<MessageResponse> =
        state.message_service.list(query.limit).await?.into_iter().map(Into::into).collect();
    let count = messages.len();

    Ok(Json(ListMessagesResponse { messages, count }))
}

/// Returns the number of stored messages.
///
/// # Errors
/// Returns `AppError::Storage` if the query fails.
pub async fn count_messages(State(state): State<AppState>) -> Result<Json<CountResponse>> {
    let count = state.message_service.count().await?;
    Ok(Json(CountResponse { count }))
}

/// Deletes one message by id.
///
/// # Errors
/// Returns `AppError::Validation` if the id is not an integer.
/// Returns `AppError::NotFound` if no message has that id.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<DeleteMessageResponse>> {
    let id: MessageId = raw_id.parse()?;

    if !state.message_service.delete_by_id(id).await? {
        return Err(AppError::NotFound);
    }

    Ok(Json(DeleteMessageResponse { success: true, id: id.0 }))
}

/// Deletes every message. Requires `?confirm=true`.
///
/// # Errors
/// Returns `AppError::Validation` without confirmation.
/// Returns `AppError::Storage` if the deletion fails.
pub async fn delete_all_messages(
    State(state): State<AppState>,
    query: std::result::Result<Query<DeleteAllQuery>, QueryRejection>,
) -> Result<Json<DeleteAllResponse>> {
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;

    let deleted = state.message_service.delete_all(query.confirm).await?;
    Ok(Json(DeleteAllResponse { success: true, deleted }))
}
