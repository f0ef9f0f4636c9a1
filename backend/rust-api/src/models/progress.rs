use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Per-(student, chapter) progress row, created lazily on first view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterProgress {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub chapter_id: String,
    pub status: ProgressStatus,
    pub progress_percentage: u32,
    #[serde(with = "bson_datetime_as_chrono")]
    pub started_at: DateTime<Utc>,
    /// Immutable once set; there is no un-complete path.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProgressResponse {
    pub id: String,
    pub chapter_id: String,
    pub status: ProgressStatus,
    pub progress_percentage: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<ChapterProgress> for ChapterProgressResponse {
    fn from(p: ChapterProgress) -> Self {
        Self {
            id: p.id,
            chapter_id: p.chapter_id,
            status: p.status,
            progress_percentage: p.progress_percentage,
            started_at: p.started_at,
            completed_at: p.completed_at,
        }
    }
}
