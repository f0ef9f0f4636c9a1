use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::chat::{
        ConversationQuery, MarkReadRequest, MessageResponse, SendMessageRequest, UnreadCount,
    },
    services::{chat_service::ChatService, AppState},
};

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let service = ChatService::new(state.mongo.clone(), state.redis.clone());
    let message = service
        .send_message(&claims.sub, &req.recipient_id, &req.body)
        .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

pub async fn conversation(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let service = ChatService::new(state.mongo.clone(), state.redis.clone());
    let messages = service.conversation(&claims.sub, &query.with).await?;
    Ok(Json(
        messages.into_iter().map(MessageResponse::from).collect(),
    ))
}

pub async fn unread_counts(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<UnreadCount>>, ApiError> {
    let service = ChatService::new(state.mongo.clone(), state.redis.clone());
    let counts = service.unread_counts(&claims.sub).await?;
    Ok(Json(counts))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<MarkReadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = ChatService::new(state.mongo.clone(), state.redis.clone());
    let marked = service
        .mark_conversation_read(&claims.sub, &req.with_user_id)
        .await?;
    Ok(Json(json!({ "markedRead": marked })))
}
