use std::collections::HashMap;

use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::FindOptions, Database};
use uuid::Uuid;

use crate::error::{is_duplicate_key, ApiError};
use crate::metrics::CHAPTERS_COMPLETED_TOTAL;
use crate::models::achievement::ActivityKind;
use crate::models::attempt::{AttemptStatus, QuizAttempt};
use crate::models::course::{Chapter, ChapterWithLockStatus, Quiz};
use crate::models::event::{DomainEvent, DomainEventKind, EventStatus};
use crate::models::progress::{ChapterProgress, ProgressStatus};
use crate::models::to_bson_datetime;
use crate::services::achievement_service::AchievementService;

pub struct ProgressService {
    mongo: Database,
}

/// One row of the pure unlock computation, pre-sorted by chapter order.
#[derive(Debug, Clone)]
pub struct UnlockRow {
    pub order: u32,
    pub progress: Option<ProgressStatus>,
    pub has_quiz: bool,
    pub latest_attempt_passed: bool,
}

/// Derived lock flags, one per row. The first chapter is never locked;
/// chapter N+1 unlocks only when chapter N is completed and its quiz (if
/// any) has a passed latest attempt. Pure function of persisted state, no
/// stored flag.
pub fn compute_locked(rows: &[UnlockRow]) -> Vec<bool> {
    let mut locked = Vec::with_capacity(rows.len());
    for (i, _row) in rows.iter().enumerate() {
        if i == 0 {
            locked.push(false);
            continue;
        }
        let prev = &rows[i - 1];
        let prev_completed = prev.progress == Some(ProgressStatus::Completed);
        let prev_quiz_cleared = !prev.has_quiz || prev.latest_attempt_passed;
        locked.push(!(prev_completed && prev_quiz_cleared));
    }
    locked
}

impl ProgressService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Idempotent create: the first view of a chapter opens an in_progress
    /// row; later calls return the existing row unchanged.
    pub async fn start_chapter(
        &self,
        student_id: &str,
        chapter_id: &str,
    ) -> Result<ChapterProgress, ApiError> {
        self.load_chapter(chapter_id).await?;

        let collection = self.mongo.collection::<ChapterProgress>("chapter_progress");

        if let Some(existing) = collection
            .find_one(doc! { "student_id": student_id, "chapter_id": chapter_id })
            .await
            .context("Failed to query chapter progress")?
        {
            return Ok(existing);
        }

        let progress = ChapterProgress {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            chapter_id: chapter_id.to_string(),
            status: ProgressStatus::InProgress,
            progress_percentage: 0,
            started_at: Utc::now(),
            completed_at: None,
        };

        match collection.insert_one(&progress).await {
            Ok(_) => {
                // Feed entry only for the first view, not idempotent repeats.
                AchievementService::new(self.mongo.clone())
                    .log_activity(
                        student_id,
                        ActivityKind::ChapterStarted,
                        chapter_id,
                        String::new(),
                    )
                    .await;
                Ok(progress)
            }
            // Lost the race to a concurrent first view; the existing row wins.
            Err(e) if is_duplicate_key(&e) => collection
                .find_one(doc! { "student_id": student_id, "chapter_id": chapter_id })
                .await
                .context("Failed to re-read chapter progress after conflict")?
                .ok_or_else(|| ApiError::conflict("Chapter progress vanished after conflict")),
            Err(e) => Err(ApiError::Internal(anyhow::Error::new(e))),
        }
    }

    /// First call sets completed_at and emits the completion event; every
    /// later call is a no-op because completed_at is immutable.
    pub async fn complete_chapter(
        &self,
        student_id: &str,
        chapter_id: &str,
    ) -> Result<ChapterProgress, ApiError> {
        let chapter = self.load_chapter(chapter_id).await?;
        let collection = self.mongo.collection::<ChapterProgress>("chapter_progress");

        let existing = collection
            .find_one(doc! { "student_id": student_id, "chapter_id": chapter_id })
            .await
            .context("Failed to query chapter progress")?;

        if let Some(row) = &existing {
            if row.status == ProgressStatus::Completed {
                return Ok(row.clone());
            }
        }

        let now = Utc::now();
        let completed = match existing {
            Some(row) => {
                collection
                    .update_one(
                        // status filter keeps a concurrent complete from
                        // rewriting completed_at
                        doc! { "_id": &row.id, "status": { "$ne": "completed" } },
                        doc! { "$set": {
                            "status": "completed",
                            "progress_percentage": 100,
                            "completed_at": to_bson_datetime(now),
                        }},
                    )
                    .await
                    .context("Failed to complete chapter progress")?;

                collection
                    .find_one(doc! { "_id": &row.id })
                    .await
                    .context("Failed to re-read completed chapter progress")?
                    .ok_or_else(|| ApiError::not_found("Chapter progress not found"))?
            }
            None => {
                // Completing without a prior start still records the row.
                let row = ChapterProgress {
                    id: Uuid::new_v4().to_string(),
                    student_id: student_id.to_string(),
                    chapter_id: chapter_id.to_string(),
                    status: ProgressStatus::Completed,
                    progress_percentage: 100,
                    started_at: now,
                    completed_at: Some(now),
                };
                match collection.insert_one(&row).await {
                    Ok(_) => row,
                    Err(e) if is_duplicate_key(&e) => collection
                        .find_one(doc! { "student_id": student_id, "chapter_id": chapter_id })
                        .await
                        .context("Failed to re-read chapter progress after conflict")?
                        .ok_or_else(|| {
                            ApiError::conflict("Chapter progress vanished after conflict")
                        })?,
                    Err(e) => return Err(ApiError::Internal(anyhow::Error::new(e))),
                }
            }
        };

        CHAPTERS_COMPLETED_TOTAL
            .with_label_values(&["chapter"])
            .inc();

        self.enqueue_event(
            student_id,
            DomainEventKind::ChapterCompleted {
                chapter_id: chapter_id.to_string(),
                course_id: chapter.course_id.clone(),
            },
        )
        .await;

        Ok(completed)
    }

    /// One-way coupling from a passed quiz attempt: resolve the progress row
    /// the attempt was linked to and complete its chapter.
    pub async fn complete_by_progress_id(
        &self,
        student_id: &str,
        chapter_progress_id: &str,
    ) -> Result<ChapterProgress, ApiError> {
        let collection = self.mongo.collection::<ChapterProgress>("chapter_progress");
        let row = collection
            .find_one(doc! { "_id": chapter_progress_id, "student_id": student_id })
            .await
            .context("Failed to query chapter progress by id")?
            .ok_or_else(|| {
                ApiError::not_found(format!(
                    "Chapter progress {} not found",
                    chapter_progress_id
                ))
            })?;

        self.complete_chapter(student_id, &row.chapter_id).await
    }

    /// Chapters of a course with the derived lock view for one student.
    pub async fn chapters_with_lock_status(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<Vec<ChapterWithLockStatus>, ApiError> {
        let chapters = self.load_course_chapters(course_id).await?;
        if chapters.is_empty() {
            return Err(ApiError::not_found(format!(
                "Course {} has no chapters",
                course_id
            )));
        }

        let chapter_ids: Vec<&str> = chapters.iter().map(|c| c.id.as_str()).collect();
        let progress_by_chapter = self.load_progress_map(student_id, &chapter_ids).await?;
        let quiz_by_chapter = self.load_quiz_map(&chapter_ids).await?;
        let latest_attempts = self
            .load_latest_attempts(student_id, quiz_by_chapter.values().map(String::as_str))
            .await?;

        let rows: Vec<UnlockRow> = chapters
            .iter()
            .map(|chapter| {
                let quiz_id = quiz_by_chapter.get(&chapter.id);
                UnlockRow {
                    order: chapter.order,
                    progress: progress_by_chapter.get(&chapter.id).copied(),
                    has_quiz: quiz_id.is_some(),
                    latest_attempt_passed: quiz_id
                        .and_then(|qid| latest_attempts.get(qid))
                        .map(|status| *status == AttemptStatus::Passed)
                        .unwrap_or(false),
                }
            })
            .collect();

        let locked = compute_locked(&rows);

        Ok(chapters
            .into_iter()
            .zip(locked)
            .map(|(chapter, locked)| ChapterWithLockStatus {
                quiz_id: quiz_by_chapter.get(&chapter.id).cloned(),
                progress_status: progress_by_chapter.get(&chapter.id).copied(),
                id: chapter.id,
                course_id: chapter.course_id,
                title: chapter.title,
                order: chapter.order,
                locked,
            })
            .collect())
    }

    pub async fn load_course_chapters(&self, course_id: &str) -> Result<Vec<Chapter>, ApiError> {
        let collection = self.mongo.collection::<Chapter>("chapters");
        let options = FindOptions::builder().sort(doc! { "order": 1 }).build();

        let mut cursor = collection
            .find(doc! { "course_id": course_id })
            .with_options(options)
            .await
            .context("Failed to query chapters")?;

        let mut chapters = Vec::new();
        while let Some(chapter) = cursor.try_next().await.context("Chapter cursor error")? {
            chapters.push(chapter);
        }
        Ok(chapters)
    }

    async fn load_chapter(&self, chapter_id: &str) -> Result<Chapter, ApiError> {
        self.mongo
            .collection::<Chapter>("chapters")
            .find_one(doc! { "_id": chapter_id })
            .await
            .context("Failed to query chapters collection")?
            .ok_or_else(|| ApiError::not_found(format!("Chapter {} not found", chapter_id)))
    }

    async fn load_progress_map(
        &self,
        student_id: &str,
        chapter_ids: &[&str],
    ) -> Result<HashMap<String, ProgressStatus>, ApiError> {
        let collection = self.mongo.collection::<ChapterProgress>("chapter_progress");
        let mut cursor = collection
            .find(doc! {
                "student_id": student_id,
                "chapter_id": { "$in": chapter_ids.to_vec() },
            })
            .await
            .context("Failed to query chapter progress rows")?;

        let mut map = HashMap::new();
        while let Some(row) = cursor.try_next().await.context("Progress cursor error")? {
            map.insert(row.chapter_id, row.status);
        }
        Ok(map)
    }

    async fn load_quiz_map(
        &self,
        chapter_ids: &[&str],
    ) -> Result<HashMap<String, String>, ApiError> {
        let collection = self.mongo.collection::<Quiz>("quizzes");
        let mut cursor = collection
            .find(doc! { "chapter_id": { "$in": chapter_ids.to_vec() } })
            .await
            .context("Failed to query quizzes")?;

        let mut map = HashMap::new();
        while let Some(quiz) = cursor.try_next().await.context("Quiz cursor error")? {
            map.insert(quiz.chapter_id, quiz.id);
        }
        Ok(map)
    }

    /// Status of the latest attempt (highest attempt_number) per quiz.
    async fn load_latest_attempts<'a>(
        &self,
        student_id: &str,
        quiz_ids: impl Iterator<Item = &'a str>,
    ) -> Result<HashMap<String, AttemptStatus>, ApiError> {
        let ids: Vec<&str> = quiz_ids.collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let collection = self.mongo.collection::<QuizAttempt>("quiz_attempts");
        let options = FindOptions::builder()
            .sort(doc! { "attempt_number": 1 })
            .build();

        let mut cursor = collection
            .find(doc! { "student_id": student_id, "quiz_id": { "$in": ids } })
            .with_options(options)
            .await
            .context("Failed to query quiz attempts")?;

        // Ascending sort means the last write per quiz is the latest attempt.
        let mut map = HashMap::new();
        while let Some(attempt) = cursor.try_next().await.context("Attempt cursor error")? {
            map.insert(attempt.quiz_id, attempt.status);
        }
        Ok(map)
    }

    async fn enqueue_event(&self, student_id: &str, kind: DomainEventKind) {
        let collection = self.mongo.collection::<DomainEvent>("domain_events");
        let event = DomainEvent {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            kind,
            status: EventStatus::Pending,
            created_at: Utc::now(),
            attempts: 0,
        };

        if let Err(e) = collection.insert_one(&event).await {
            tracing::error!("Failed to enqueue domain event: {:#}", e);
        }
    }
}
