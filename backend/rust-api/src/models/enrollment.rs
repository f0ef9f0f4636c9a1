use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Enrollment ledger row, unique per (student_id, course_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub status: EnrollmentStatus,
    /// round(100 * completed chapters / total chapters), always in 0..=100.
    pub progress_percentage: u32,
    #[serde(with = "bson_datetime_as_chrono")]
    pub enrolled_at: DateTime<Utc>,
    /// Set exactly once, when progress first reaches 100.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Paused,
    Completed,
    Dropped,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    #[validate(length(min = 1, message = "courseId must not be empty"))]
    pub course_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResponse {
    pub id: String,
    pub course_id: String,
    pub status: EnrollmentStatus,
    pub progress_percentage: u32,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(e: Enrollment) -> Self {
        Self {
            id: e.id,
            course_id: e.course_id,
            status: e.status,
            progress_percentage: e.progress_percentage,
            enrolled_at: e.enrolled_at,
            completed_at: e.completed_at,
        }
    }
}
