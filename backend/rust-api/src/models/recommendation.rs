use serde::{Deserialize, Serialize};

/// Aggregated student metrics sent to the external recommender service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub student_id: String,
    /// Mean enrollment progress across active/completed enrollments, 0..=100.
    pub completion_rate: u32,
    /// Achievement kinds earned so far, used as a skills proxy.
    pub skills: Vec<String>,
    /// Total achievement points.
    pub experience_points: u32,
}

/// One ranked suggestion as returned by the recommender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCourse {
    pub course_id: String,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub courses: Vec<RankedCourse>,
    /// False when the upstream service was unreachable and the list
    /// degraded to empty.
    pub upstream_healthy: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommenderHealth {
    pub is_healthy: bool,
}
