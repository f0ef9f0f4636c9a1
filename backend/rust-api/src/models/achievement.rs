use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono;

/// Append-only award row, unique per (student_id, kind, related_entity_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub kind: AchievementKind,
    /// The quiz/chapter/course/project that triggered the award.
    pub related_entity_id: String,
    pub points: u32,
    #[serde(with = "bson_datetime_as_chrono")]
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    QuizPassed,
    PerfectScore,
    ChapterCompleted,
    CourseCompleted,
    ProjectCompleted,
}

impl AchievementKind {
    /// Fixed point value per achievement type.
    pub fn points(self) -> u32 {
        match self {
            AchievementKind::QuizPassed => 20,
            AchievementKind::PerfectScore => 30,
            AchievementKind::ChapterCompleted => 10,
            AchievementKind::CourseCompleted => 50,
            AchievementKind::ProjectCompleted => 40,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AchievementKind::QuizPassed => "quiz_passed",
            AchievementKind::PerfectScore => "perfect_score",
            AchievementKind::ChapterCompleted => "chapter_completed",
            AchievementKind::CourseCompleted => "course_completed",
            AchievementKind::ProjectCompleted => "project_completed",
        }
    }
}

/// Append-only activity feed entry; a side-effect writer, never a source
/// of new invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub kind: ActivityKind,
    pub related_entity_id: String,
    #[serde(default)]
    pub detail: String,
    #[serde(with = "bson_datetime_as_chrono")]
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    QuizAttempted,
    QuizPassed,
    ChapterStarted,
    ChapterCompleted,
    CourseCompleted,
    TicketCompleted,
    ProjectCompleted,
    AchievementEarned,
}
