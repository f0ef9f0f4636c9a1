use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono;

/// Fire-and-forget notification row. Writers never treat a failed insert
/// as fatal to the triggering flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub body: String,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    QuizPassed,
    QuizFailed,
    ChapterCompleted,
    CourseCompleted,
    ProjectCompleted,
    AchievementEarned,
    NewMessage,
}
