use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::enrollment::{EnrollRequest, EnrollmentResponse},
    services::{enrollment_service::EnrollmentService, AppState},
};

pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<EnrollRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    tracing::info!(
        "Enrolling student={} in course={}",
        claims.sub,
        req.course_id
    );

    let service = EnrollmentService::new(state.mongo.clone());
    let enrollment = service.enroll(&claims.sub, &req.course_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(EnrollmentResponse::from(enrollment)),
    ))
}

pub async fn list_enrollments(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<EnrollmentResponse>>, ApiError> {
    let service = EnrollmentService::new(state.mongo.clone());
    let enrollments = service.list_for_student(&claims.sub).await?;
    Ok(Json(
        enrollments.into_iter().map(EnrollmentResponse::from).collect(),
    ))
}
