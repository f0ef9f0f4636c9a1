use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use futures::TryStreamExt;
use mongodb::bson::doc;
use serde::Serialize;

use crate::{
    error::ApiError,
    middlewares::auth::JwtClaims,
    models::course::{ChapterWithLockStatus, Course},
    services::{progress_service::ProgressService, AppState},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// Published course catalog. Authoring happens out of band, so this is the
/// only course surface the API exposes.
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CourseSummary>>, ApiError> {
    let collection = state.mongo.collection::<Course>("courses");
    let mut cursor = collection
        .find(doc! { "published": true })
        .await
        .context("Failed to query courses")?;

    let mut courses = Vec::new();
    while let Some(course) = cursor.try_next().await.context("Course cursor error")? {
        courses.push(CourseSummary {
            id: course.id,
            title: course.title,
            slug: course.slug,
            description: course.description,
        });
    }
    Ok(Json(courses))
}

/// Chapters of a course with the derived per-student lock view.
pub async fn course_chapters(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<Json<Vec<ChapterWithLockStatus>>, ApiError> {
    let service = ProgressService::new(state.mongo.clone());
    let chapters = service
        .chapters_with_lock_status(&claims.sub, &course_id)
        .await?;
    Ok(Json(chapters))
}
