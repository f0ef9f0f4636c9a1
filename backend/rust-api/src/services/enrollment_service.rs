use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::FindOptions, Database};
use uuid::Uuid;

use crate::error::{is_duplicate_key, ApiError};
use crate::models::course::{Chapter, Course};
use crate::models::enrollment::{Enrollment, EnrollmentStatus};
use crate::models::event::{DomainEvent, DomainEventKind, EventStatus};
use crate::models::progress::ChapterProgress;
use crate::services::grading::percentage;
use crate::models::to_bson_datetime;

pub struct EnrollmentService {
    mongo: Database,
}

impl EnrollmentService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Enroll the student in a published course. The unique index on
    /// (student_id, course_id) turns a duplicate enrollment into Conflict.
    pub async fn enroll(&self, student_id: &str, course_id: &str) -> Result<Enrollment, ApiError> {
        let course = self
            .mongo
            .collection::<Course>("courses")
            .find_one(doc! { "_id": course_id, "published": true })
            .await
            .context("Failed to query courses collection")?
            .ok_or_else(|| ApiError::not_found(format!("Course {} not found", course_id)))?;

        let enrollment = Enrollment {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            course_id: course.id.clone(),
            status: EnrollmentStatus::Active,
            progress_percentage: 0,
            enrolled_at: Utc::now(),
            completed_at: None,
        };

        let collection = self.mongo.collection::<Enrollment>("enrollments");
        match collection.insert_one(&enrollment).await {
            Ok(_) => {
                tracing::info!("Student {} enrolled in course {}", student_id, course_id);
                Ok(enrollment)
            }
            Err(e) if is_duplicate_key(&e) => Err(ApiError::conflict(format!(
                "Student already enrolled in course {}",
                course_id
            ))),
            Err(e) => Err(ApiError::Internal(anyhow::Error::new(e))),
        }
    }

    pub async fn list_for_student(&self, student_id: &str) -> Result<Vec<Enrollment>, ApiError> {
        let collection = self.mongo.collection::<Enrollment>("enrollments");
        let options = FindOptions::builder()
            .sort(doc! { "enrolled_at": -1 })
            .build();

        let mut cursor = collection
            .find(doc! { "student_id": student_id })
            .with_options(options)
            .await
            .context("Failed to query enrollments")?;

        let mut enrollments = Vec::new();
        while let Some(e) = cursor.try_next().await.context("Enrollment cursor error")? {
            enrollments.push(e);
        }
        Ok(enrollments)
    }

    /// Recompute progress_percentage = round(100 * completed / total) and
    /// flip the enrollment to completed exactly once at 100. Runs server-
    /// side from the outbox worker after every chapter-completion event.
    pub async fn recompute_course_progress(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>, ApiError> {
        let collection = self.mongo.collection::<Enrollment>("enrollments");
        let enrollment = collection
            .find_one(doc! { "student_id": student_id, "course_id": course_id })
            .await
            .context("Failed to query enrollment for recompute")?;

        let Some(enrollment) = enrollment else {
            // Chapter progress without an enrollment is possible when an
            // admin seeds progress directly; nothing to recompute.
            tracing::warn!(
                "No enrollment for student={}, course={}; skipping recompute",
                student_id,
                course_id
            );
            return Ok(None);
        };

        let chapter_ids = self.course_chapter_ids(course_id).await?;
        let total = chapter_ids.len() as u32;

        let completed = self
            .mongo
            .collection::<ChapterProgress>("chapter_progress")
            .count_documents(doc! {
                "student_id": student_id,
                "chapter_id": { "$in": &chapter_ids },
                "status": "completed",
            })
            .await
            .context("Failed to count completed chapters")? as u32;

        let pct = percentage(completed, total);
        let now = Utc::now();

        let mut update = doc! { "progress_percentage": pct };
        let newly_completed = pct == 100 && enrollment.status != EnrollmentStatus::Completed;
        if newly_completed {
            update.insert("status", "completed");
            // completed_at is written once and never rewritten
            if enrollment.completed_at.is_none() {
                update.insert("completed_at", to_bson_datetime(now));
            }
        }

        collection
            .update_one(doc! { "_id": &enrollment.id }, doc! { "$set": update })
            .await
            .context("Failed to update enrollment progress")?;

        if newly_completed {
            self.enqueue_course_completed(student_id, course_id).await;
        }

        let updated = collection
            .find_one(doc! { "_id": &enrollment.id })
            .await
            .context("Failed to re-read enrollment")?;

        tracing::info!(
            "Enrollment recomputed: student={}, course={}, completed={}/{}, pct={}",
            student_id,
            course_id,
            completed,
            total,
            pct
        );

        Ok(updated)
    }

    async fn course_chapter_ids(&self, course_id: &str) -> Result<Vec<String>, ApiError> {
        let collection = self.mongo.collection::<Chapter>("chapters");
        let mut cursor = collection
            .find(doc! { "course_id": course_id })
            .await
            .context("Failed to query course chapters")?;

        let mut ids = Vec::new();
        while let Some(chapter) = cursor.try_next().await.context("Chapter cursor error")? {
            ids.push(chapter.id);
        }
        Ok(ids)
    }

    async fn enqueue_course_completed(&self, student_id: &str, course_id: &str) {
        let collection = self.mongo.collection::<DomainEvent>("domain_events");
        let event = DomainEvent {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            kind: DomainEventKind::CourseCompleted {
                course_id: course_id.to_string(),
            },
            status: EventStatus::Pending,
            created_at: Utc::now(),
            attempts: 0,
        };

        if let Err(e) = collection.insert_one(&event).await {
            tracing::error!("Failed to enqueue course_completed event: {:#}", e);
        }
    }
}
