use anyhow::{Context, Result};
use futures::TryStreamExt;
use mongodb::{bson::doc, Database};
use redis::aio::ConnectionManager;

use crate::error::ApiError;
use crate::metrics::{record_cache_hit, record_cache_miss, RECOMMENDER_REQUESTS_TOTAL};
use crate::models::achievement::Achievement;
use crate::models::enrollment::Enrollment;
use crate::models::recommendation::{RankedCourse, RecommendationResponse, StudentProfile};
use crate::services::grading::percentage;

const CACHE_TTL: u64 = 300; // 5 minutes
const UPSTREAM_TIMEOUT_SECS: u64 = 3;

/// Client for the external recommender (a separate Python scoring service).
/// The upstream is opaque: this service only builds the profile, calls the
/// two endpoints, and degrades to an empty list when it is unreachable.
pub struct RecommendationService {
    mongo: Database,
    redis: ConnectionManager,
    recommender_api_url: String,
}

impl RecommendationService {
    pub fn new(mongo: Database, redis: ConnectionManager, recommender_api_url: String) -> Self {
        Self {
            mongo,
            redis,
            recommender_api_url,
        }
    }

    pub async fn is_healthy(&self) -> bool {
        let client = match reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .build()
        {
            Ok(c) => c,
            Err(_) => return false,
        };

        let url = format!("{}/health", self.recommender_api_url);
        match client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!("Recommender health check failed: {}", e);
                false
            }
        }
    }

    /// Ranked course suggestions for the student. Upstream failures never
    /// propagate: the caller gets an empty list with upstream_healthy=false.
    pub async fn recommend(&self, student_id: &str) -> Result<RecommendationResponse, ApiError> {
        if let Some(cached) = self.check_cache(student_id).await {
            record_cache_hit();
            return Ok(cached);
        }
        record_cache_miss();

        let profile = self.build_profile(student_id).await?;

        match self.query_recommender(&profile).await {
            Ok(courses) => {
                RECOMMENDER_REQUESTS_TOTAL
                    .with_label_values(&["success"])
                    .inc();
                let response = RecommendationResponse {
                    courses,
                    upstream_healthy: true,
                };
                self.cache_response(student_id, &response).await;
                Ok(response)
            }
            Err(e) => {
                RECOMMENDER_REQUESTS_TOTAL
                    .with_label_values(&["degraded"])
                    .inc();
                tracing::warn!(
                    "Recommender unreachable for student={}, degrading: {:#}",
                    student_id,
                    e
                );
                Ok(RecommendationResponse {
                    courses: Vec::new(),
                    upstream_healthy: false,
                })
            }
        }
    }

    /// Aggregates enrollment completion, achievement kinds (skills proxy),
    /// and total points into the profile the scorer expects.
    pub async fn build_profile(&self, student_id: &str) -> Result<StudentProfile, ApiError> {
        let mut enrollments_cursor = self
            .mongo
            .collection::<Enrollment>("enrollments")
            .find(doc! { "student_id": student_id })
            .await
            .context("Failed to query enrollments for profile")?;

        let mut progress_sum = 0u32;
        let mut enrollment_count = 0u32;
        while let Some(e) = enrollments_cursor
            .try_next()
            .await
            .context("Enrollment cursor error")?
        {
            progress_sum += e.progress_percentage;
            enrollment_count += 1;
        }

        let completion_rate = if enrollment_count == 0 {
            0
        } else {
            percentage(progress_sum, enrollment_count * 100)
        };

        let mut achievements_cursor = self
            .mongo
            .collection::<Achievement>("achievements")
            .find(doc! { "student_id": student_id })
            .await
            .context("Failed to query achievements for profile")?;

        let mut skills = std::collections::BTreeSet::new();
        let mut experience_points = 0u32;
        while let Some(a) = achievements_cursor
            .try_next()
            .await
            .context("Achievement cursor error")?
        {
            skills.insert(a.kind.as_str().to_string());
            experience_points += a.points;
        }

        Ok(StudentProfile {
            student_id: student_id.to_string(),
            completion_rate,
            skills: skills.into_iter().collect(),
            experience_points,
        })
    }

    async fn query_recommender(&self, profile: &StudentProfile) -> Result<Vec<RankedCourse>> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        let url = format!("{}/recommend", self.recommender_api_url);
        let response = client
            .post(&url)
            .json(profile)
            .send()
            .await
            .context("Recommender request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Recommender returned status {}", response.status());
        }

        #[derive(serde::Deserialize)]
        struct RecommenderPayload {
            courses: Vec<RankedCourse>,
        }

        let payload: RecommenderPayload = response
            .json()
            .await
            .context("Failed to parse recommender response")?;

        Ok(payload.courses)
    }

    async fn check_cache(&self, student_id: &str) -> Option<RecommendationResponse> {
        let mut conn = self.redis.clone();
        let cache_key = format!("recommendations:{}", student_id);

        let cached: Option<String> = redis::cmd("GET")
            .arg(&cache_key)
            .query_async(&mut conn)
            .await
            .ok()?;

        cached.and_then(|json| serde_json::from_str(&json).ok())
    }

    async fn cache_response(&self, student_id: &str, response: &RecommendationResponse) {
        let mut conn = self.redis.clone();
        let cache_key = format!("recommendations:{}", student_id);

        let json = match serde_json::to_string(response) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize recommendations for cache: {}", e);
                return;
            }
        };

        if let Err(e) = redis::cmd("SETEX")
            .arg(&cache_key)
            .arg(CACHE_TTL)
            .arg(&json)
            .query_async::<()>(&mut conn)
            .await
        {
            tracing::warn!("Failed to cache recommendations: {}", e);
        }
    }
}
