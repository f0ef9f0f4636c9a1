use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::{
    error::ApiError,
    middlewares::auth::JwtClaims,
    models::notification::Notification,
    services::{notification_service::NotificationService, AppState},
};

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let service = NotificationService::new(state.mongo.clone());
    let notifications = service.list_for_user(&claims.sub).await?;
    Ok(Json(notifications))
}

pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(notification_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = NotificationService::new(state.mongo.clone());
    service.mark_read(&claims.sub, &notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
