use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::bson_datetime_as_chrono;

/// One graded (or in-progress) submission of quiz answers by a student.
/// Unique per (student_id, quiz_id, attempt_number); immutable once graded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub quiz_id: String,
    pub attempt_number: u32,
    pub status: AttemptStatus,
    /// Meaningful only once status leaves InProgress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    pub time_spent_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_progress_id: Option<String>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Passed,
    Failed,
}

/// Per-question response row persisted at grading time. `is_correct`
/// stays None for open responses awaiting a human grader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub attempt_id: String,
    pub question_id: String,
    #[serde(default)]
    pub selected_item_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    pub time_spent_seconds: u32,
    #[serde(default)]
    pub chapter_progress_id: Option<String>,
    #[validate(length(min = 1, message = "answers must not be empty"))]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: String,
    #[serde(default)]
    pub question_item_ids: Vec<String>,
    #[serde(default)]
    pub response_content: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptResponse {
    pub attempt_id: String,
    pub attempt_number: u32,
    pub status: AttemptStatus,
    pub score: u32,
    pub correct_count: u32,
    pub total_questions: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub id: String,
    pub attempt_number: u32,
    pub status: AttemptStatus,
    pub score: Option<u32>,
    pub time_spent_seconds: u32,
    pub submitted_at: DateTime<Utc>,
}

impl From<QuizAttempt> for AttemptSummary {
    fn from(a: QuizAttempt) -> Self {
        Self {
            id: a.id,
            attempt_number: a.attempt_number,
            status: a.status,
            score: a.score,
            time_spent_seconds: a.time_spent_seconds,
            submitted_at: a.submitted_at,
        }
    }
}
