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
    models::project::TicketWithLockStatus,
    services::{project_service::ProjectService, AppState},
};

pub async fn enroll_project(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "Enrolling student={} in project={}",
        claims.sub,
        project_id
    );

    let service = ProjectService::new(state.mongo.clone());
    let enrollment = service.enroll(&claims.sub, &project_id).await?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn project_tickets(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<TicketWithLockStatus>>, ApiError> {
    let service = ProjectService::new(state.mongo.clone());
    let tickets = service
        .tickets_with_lock_status(&claims.sub, &project_id)
        .await?;
    Ok(Json(tickets))
}

pub async fn start_ticket(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(ticket_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = ProjectService::new(state.mongo.clone());
    let progress = service.start_ticket(&claims.sub, &ticket_id).await?;
    Ok((StatusCode::OK, Json(progress)))
}

pub async fn complete_ticket(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(ticket_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = ProjectService::new(state.mongo.clone());
    let progress = service.complete_ticket(&claims.sub, &ticket_id).await?;
    Ok((StatusCode::OK, Json(progress)))
}
