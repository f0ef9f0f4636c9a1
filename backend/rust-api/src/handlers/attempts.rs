use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::attempt::{AttemptSummary, SubmitAttemptRequest},
    services::{attempt_service::AttemptService, AppState},
};

pub async fn submit_attempt(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
    AppJson(req): AppJson<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let service = AttemptService::new(state.mongo.clone());
    let response = service.submit_attempt(&claims.sub, &quiz_id, &req).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_attempts(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
) -> Result<Json<Vec<AttemptSummary>>, ApiError> {
    let service = AttemptService::new(state.mongo.clone());
    let attempts = service.list_attempts(&claims.sub, &quiz_id).await?;
    Ok(Json(attempts))
}
