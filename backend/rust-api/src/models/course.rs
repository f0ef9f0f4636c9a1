use serde::{Deserialize, Serialize};

/// Course definition stored in the "courses" collection. Authoring happens
/// out of band; the API only ever reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub published: bool,
}

/// Chapter within a course, ordered by `order` (1-based within the course).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(rename = "_id")]
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub order: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(rename = "_id")]
    pub id: String,
    pub chapter_id: String,
    pub title: String,
    /// Minimum score (0..=100) required to pass an attempt.
    pub success_percentage: u32,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    /// 1-based display position within the quiz; dense at authoring time.
    pub rank: u32,
    #[serde(default)]
    pub items: Vec<QuestionItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Mcq,
    UniqueChoice,
    OpenResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionItem {
    pub id: String,
    pub content: String,
    /// Tri-state: open-response model answers are NotApplicable rather than
    /// a null flag.
    #[serde(default)]
    pub correctness: Correctness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_response: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
    Correct,
    #[default]
    Incorrect,
    NotApplicable,
}

/// Derived per-chapter view for a student: lock status is a pure function
/// of chapter order, progress rows, and the latest attempt per quiz. It is
/// never stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterWithLockStatus {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub order: u32,
    pub locked: bool,
    pub progress_status: Option<crate::models::progress::ProgressStatus>,
    pub quiz_id: Option<String>,
}
