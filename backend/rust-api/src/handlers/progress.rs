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
    models::progress::ChapterProgressResponse,
    services::{progress_service::ProgressService, AppState},
};

/// Idempotent first-view create; repeat calls return the existing row.
pub async fn start_chapter(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(chapter_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Starting chapter={} for student={}", chapter_id, claims.sub);

    let service = ProgressService::new(state.mongo.clone());
    let progress = service.start_chapter(&claims.sub, &chapter_id).await?;

    Ok((
        StatusCode::OK,
        Json(ChapterProgressResponse::from(progress)),
    ))
}

/// First call completes the chapter; completed_at never changes afterward.
pub async fn complete_chapter(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(chapter_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "Completing chapter={} for student={}",
        chapter_id,
        claims.sub
    );

    let service = ProgressService::new(state.mongo.clone());
    let progress = service.complete_chapter(&claims.sub, &chapter_id).await?;

    Ok((
        StatusCode::OK,
        Json(ChapterProgressResponse::from(progress)),
    ))
}
