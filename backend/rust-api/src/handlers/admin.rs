use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::{
    error::ApiError,
    models::achievement::ActivityEntry,
    models::enrollment::EnrollmentResponse,
    services::{
        achievement_service::AchievementService, enrollment_service::EnrollmentService, AppState,
    },
};

const ADMIN_ACTIVITY_PAGE: i64 = 250;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgressOverview {
    pub student_id: String,
    pub enrollments: Vec<EnrollmentResponse>,
    pub total_achievement_points: u32,
}

/// Read-only oversight for the admin console: a student's enrollments and
/// accumulated points.
pub async fn student_progress(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> Result<Json<StudentProgressOverview>, ApiError> {
    let enrollments = EnrollmentService::new(state.mongo.clone())
        .list_for_student(&student_id)
        .await?;

    let achievements = AchievementService::new(state.mongo.clone())
        .list_for_student(&student_id)
        .await?;
    let total_achievement_points = achievements.iter().map(|a| a.points).sum();

    Ok(Json(StudentProgressOverview {
        student_id,
        enrollments: enrollments.into_iter().map(EnrollmentResponse::from).collect(),
        total_achievement_points,
    }))
}

pub async fn student_activity(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> Result<Json<Vec<ActivityEntry>>, ApiError> {
    let entries = AchievementService::new(state.mongo.clone())
        .list_activity(&student_id, ADMIN_ACTIVITY_PAGE)
        .await?;
    Ok(Json(entries))
}
