use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono;

/// Outbox row written in the same flow as the primary domain write.
/// Downstream effects (chapter completion, enrollment recompute,
/// achievements, notifications) are applied idempotently by the event
/// worker, so a crash between steps cannot silently lose one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub kind: DomainEventKind,
    pub status: EventStatus,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEventKind {
    QuizGraded {
        quiz_id: String,
        attempt_id: String,
        score: u32,
        passed: bool,
        chapter_progress_id: Option<String>,
    },
    ChapterCompleted {
        chapter_id: String,
        course_id: String,
    },
    CourseCompleted {
        course_id: String,
    },
    TicketCompleted {
        ticket_id: String,
        project_id: String,
    },
    ProjectCompleted {
        project_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Processed,
}
