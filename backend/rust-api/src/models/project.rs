use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::progress::ProgressStatus;
use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};
use crate::models::enrollment::EnrollmentStatus;

/// Mini-project definition, read-only for the API like courses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub published: bool,
}

/// Ticket within a project, ordered like chapters within a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(rename = "_id")]
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub order: u32,
}

/// Structural mirror of Enrollment for the project track, unique per
/// (student_id, project_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEnrollment {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub project_id: String,
    pub status: EnrollmentStatus,
    pub progress_percentage: u32,
    #[serde(with = "bson_datetime_as_chrono")]
    pub enrolled_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Structural mirror of ChapterProgress, unique per (student_id, ticket_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketProgress {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub ticket_id: String,
    pub status: ProgressStatus,
    pub progress_percentage: u32,
    #[serde(with = "bson_datetime_as_chrono")]
    pub started_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Derived per-ticket lock view; same rule as chapters minus the quiz
/// clause (tickets carry no quiz).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketWithLockStatus {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub order: u32,
    pub locked: bool,
    pub progress_status: Option<ProgressStatus>,
}
