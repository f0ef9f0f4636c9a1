use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use crate::{
    error::ApiError,
    middlewares::auth::JwtClaims,
    models::achievement::{Achievement, ActivityEntry},
    services::{achievement_service::AchievementService, AppState},
};

const ACTIVITY_PAGE: i64 = 100;

pub async fn list_achievements(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<Achievement>>, ApiError> {
    let service = AchievementService::new(state.mongo.clone());
    let achievements = service.list_for_student(&claims.sub).await?;
    Ok(Json(achievements))
}

pub async fn list_activity(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<ActivityEntry>>, ApiError> {
    let service = AchievementService::new(state.mongo.clone());
    let entries = service.list_activity(&claims.sub, ACTIVITY_PAGE).await?;
    Ok(Json(entries))
}
