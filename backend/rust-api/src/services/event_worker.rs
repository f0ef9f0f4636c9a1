use std::time::Duration;

use anyhow::{Context, Result};
use futures::TryStreamExt;
use mongodb::{bson::doc, options::FindOptions, Database};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::Config;
use crate::metrics::EVENT_WORKER_TICKS_TOTAL;
use crate::models::achievement::{AchievementKind, ActivityKind};
use crate::models::event::{DomainEvent, DomainEventKind};
use crate::models::notification::NotificationKind;
use crate::services::achievement_service::AchievementService;
use crate::services::enrollment_service::EnrollmentService;
use crate::services::notification_service::NotificationService;
use crate::services::progress_service::ProgressService;
use crate::services::project_service::ProjectService;

const BATCH_SIZE: i64 = 50;

/// Outbox processor. The grading/completion flows commit their primary
/// write plus a pending event row; this worker applies the downstream
/// effects (chapter completion, recomputes, achievements, notifications)
/// and marks each event processed only after a fully successful pass, so
/// every effect is retried until it lands. All effects are idempotent.
pub struct EventWorker {
    mongo: Database,
    config: Config,
}

impl EventWorker {
    pub fn new(mongo: Database, config: Config) -> Self {
        Self { mongo, config }
    }

    pub async fn run(&self) {
        let interval = Duration::from_secs(self.config.events_worker_interval_secs);
        info!(
            "Starting event worker loop (interval {}s)",
            interval.as_secs()
        );

        loop {
            match self.run_once().await {
                Ok(processed) => {
                    EVENT_WORKER_TICKS_TOTAL
                        .with_label_values(&["success"])
                        .inc();
                    if processed > 0 {
                        info!("Event worker tick processed {} events", processed);
                    }
                }
                Err(err) => {
                    EVENT_WORKER_TICKS_TOTAL.with_label_values(&["error"]).inc();
                    warn!(error = %err, "Event worker tick failed");
                }
            }

            sleep(interval).await;
        }
    }

    /// One polling pass over pending events, oldest first.
    pub async fn run_once(&self) -> Result<usize> {
        let collection = self.mongo.collection::<DomainEvent>("domain_events");
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1 })
            .limit(BATCH_SIZE)
            .build();

        let mut cursor = collection
            .find(doc! { "status": "pending" })
            .with_options(options)
            .await
            .context("Failed to query pending events")?;

        let mut pending = Vec::new();
        while let Some(event) = cursor.try_next().await.context("Event cursor error")? {
            pending.push(event);
        }

        let mut processed = 0;
        for event in pending {
            match self.apply(&event).await {
                Ok(()) => {
                    collection
                        .update_one(
                            doc! { "_id": &event.id },
                            doc! {
                                "$set": { "status": "processed" },
                                "$inc": { "attempts": 1 },
                            },
                        )
                        .await
                        .context("Failed to mark event processed")?;
                    processed += 1;
                }
                Err(err) => {
                    warn!(
                        event_id = %event.id,
                        error = %err,
                        "Event application failed; will retry next tick"
                    );
                    collection
                        .update_one(
                            doc! { "_id": &event.id },
                            doc! { "$inc": { "attempts": 1 } },
                        )
                        .await
                        .context("Failed to bump event attempt count")?;
                }
            }
        }

        Ok(processed)
    }

    async fn apply(&self, event: &DomainEvent) -> Result<()> {
        let achievements = AchievementService::new(self.mongo.clone());
        let notifications = NotificationService::new(self.mongo.clone());
        let student_id = event.student_id.as_str();

        match &event.kind {
            DomainEventKind::QuizGraded {
                quiz_id,
                attempt_id,
                score,
                passed,
                chapter_progress_id,
            } => {
                achievements
                    .log_activity(
                        student_id,
                        if *passed {
                            ActivityKind::QuizPassed
                        } else {
                            ActivityKind::QuizAttempted
                        },
                        quiz_id,
                        format!("attempt {} scored {}", attempt_id, score),
                    )
                    .await;

                if *passed {
                    achievements
                        .award(student_id, AchievementKind::QuizPassed, quiz_id)
                        .await?;
                    if *score == 100 {
                        achievements
                            .award(student_id, AchievementKind::PerfectScore, quiz_id)
                            .await?;
                    }
                    notifications
                        .notify(
                            student_id,
                            NotificationKind::QuizPassed,
                            format!("You passed the quiz with {}%", score),
                        )
                        .await;

                    // One-way coupling: a passed attempt linked to a chapter
                    // progress row completes that chapter.
                    if let Some(progress_id) = chapter_progress_id {
                        ProgressService::new(self.mongo.clone())
                            .complete_by_progress_id(student_id, progress_id)
                            .await
                            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
                    }
                } else {
                    notifications
                        .notify(
                            student_id,
                            NotificationKind::QuizFailed,
                            format!("Quiz attempt scored {}%; try again", score),
                        )
                        .await;
                }
            }
            DomainEventKind::ChapterCompleted {
                chapter_id,
                course_id,
            } => {
                achievements
                    .award(student_id, AchievementKind::ChapterCompleted, chapter_id)
                    .await?;
                achievements
                    .log_activity(
                        student_id,
                        ActivityKind::ChapterCompleted,
                        chapter_id,
                        String::new(),
                    )
                    .await;
                notifications
                    .notify(
                        student_id,
                        NotificationKind::ChapterCompleted,
                        "Chapter completed".to_string(),
                    )
                    .await;

                EnrollmentService::new(self.mongo.clone())
                    .recompute_course_progress(student_id, course_id)
                    .await
                    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            }
            DomainEventKind::CourseCompleted { course_id } => {
                achievements
                    .award(student_id, AchievementKind::CourseCompleted, course_id)
                    .await?;
                achievements
                    .log_activity(
                        student_id,
                        ActivityKind::CourseCompleted,
                        course_id,
                        String::new(),
                    )
                    .await;
                notifications
                    .notify(
                        student_id,
                        NotificationKind::CourseCompleted,
                        "Course completed, congratulations!".to_string(),
                    )
                    .await;
            }
            DomainEventKind::TicketCompleted {
                ticket_id,
                project_id,
            } => {
                achievements
                    .log_activity(
                        student_id,
                        ActivityKind::TicketCompleted,
                        ticket_id,
                        String::new(),
                    )
                    .await;

                ProjectService::new(self.mongo.clone())
                    .recompute_project_progress(student_id, project_id)
                    .await
                    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            }
            DomainEventKind::ProjectCompleted { project_id } => {
                achievements
                    .award(student_id, AchievementKind::ProjectCompleted, project_id)
                    .await?;
                achievements
                    .log_activity(
                        student_id,
                        ActivityKind::ProjectCompleted,
                        project_id,
                        String::new(),
                    )
                    .await;
                notifications
                    .notify(
                        student_id,
                        NotificationKind::ProjectCompleted,
                        "Project completed".to_string(),
                    )
                    .await;
            }
        }

        Ok(())
    }
}
