use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use crate::{
    error::ApiError,
    middlewares::auth::JwtClaims,
    models::recommendation::{RecommendationResponse, RecommenderHealth},
    services::{recommendation_service::RecommendationService, AppState},
};

/// Ranked course suggestions. An unreachable recommender degrades to an
/// empty list rather than an error.
pub async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let service = RecommendationService::new(
        state.mongo.clone(),
        state.redis.clone(),
        state.config.recommender_api_url.clone(),
    );

    let response = service.recommend(&claims.sub).await?;
    Ok(Json(response))
}

pub async fn recommender_health(
    State(state): State<Arc<AppState>>,
) -> Json<RecommenderHealth> {
    let service = RecommendationService::new(
        state.mongo.clone(),
        state.redis.clone(),
        state.config.recommender_api_url.clone(),
    );

    Json(RecommenderHealth {
        is_healthy: service.is_healthy().await,
    })
}
