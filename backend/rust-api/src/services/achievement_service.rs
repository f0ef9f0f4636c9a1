use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::FindOptions, Database};
use uuid::Uuid;

use crate::error::{is_duplicate_key, ApiError};
use crate::metrics::ACHIEVEMENTS_AWARDED_TOTAL;
use crate::models::achievement::{
    Achievement, AchievementKind, ActivityEntry, ActivityKind,
};

pub struct AchievementService {
    mongo: Database,
}

impl AchievementService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Award an achievement at most once per (student, kind, related entity).
    /// A lookup-before-insert keeps the common path quiet; the unique index
    /// backstops the race. Returns the award if it was newly created.
    pub async fn award(
        &self,
        student_id: &str,
        kind: AchievementKind,
        related_entity_id: &str,
    ) -> Result<Option<Achievement>, ApiError> {
        let collection = self.mongo.collection::<Achievement>("achievements");

        let existing = collection
            .find_one(doc! {
                "student_id": student_id,
                "kind": kind.as_str(),
                "related_entity_id": related_entity_id,
            })
            .await
            .context("Failed to check existing achievement")?;

        if existing.is_some() {
            return Ok(None);
        }

        let achievement = Achievement {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            kind,
            related_entity_id: related_entity_id.to_string(),
            points: kind.points(),
            awarded_at: Utc::now(),
        };

        match collection.insert_one(&achievement).await {
            Ok(_) => {
                ACHIEVEMENTS_AWARDED_TOTAL
                    .with_label_values(&[kind.as_str()])
                    .inc();
                tracing::info!(
                    "Achievement awarded: student={}, kind={}, entity={}",
                    student_id,
                    kind.as_str(),
                    related_entity_id
                );

                self.log_activity(
                    student_id,
                    ActivityKind::AchievementEarned,
                    related_entity_id,
                    format!("{} (+{} pts)", kind.as_str(), kind.points()),
                )
                .await;

                Ok(Some(achievement))
            }
            // A concurrent worker tick won the insert; nothing was lost.
            Err(e) if is_duplicate_key(&e) => Ok(None),
            Err(e) => Err(ApiError::Internal(anyhow::Error::new(e))),
        }
    }

    /// Append-only activity feed write. Failures are logged and swallowed:
    /// a missing feed row must never fail the triggering flow.
    pub async fn log_activity(
        &self,
        student_id: &str,
        kind: ActivityKind,
        related_entity_id: &str,
        detail: String,
    ) {
        let collection = self.mongo.collection::<ActivityEntry>("activity_log");
        let entry = ActivityEntry {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            kind,
            related_entity_id: related_entity_id.to_string(),
            detail,
            occurred_at: Utc::now(),
        };

        if let Err(e) = collection.insert_one(&entry).await {
            tracing::error!(
                "Failed to log activity for student={}: {:#}",
                student_id,
                e
            );
        }
    }

    pub async fn list_for_student(&self, student_id: &str) -> Result<Vec<Achievement>, ApiError> {
        let collection = self.mongo.collection::<Achievement>("achievements");
        let options = FindOptions::builder()
            .sort(doc! { "awarded_at": -1 })
            .build();

        let mut cursor = collection
            .find(doc! { "student_id": student_id })
            .with_options(options)
            .await
            .context("Failed to query achievements")?;

        let mut achievements = Vec::new();
        while let Some(a) = cursor
            .try_next()
            .await
            .context("Achievement cursor error")?
        {
            achievements.push(a);
        }
        Ok(achievements)
    }

    pub async fn list_activity(
        &self,
        student_id: &str,
        limit: i64,
    ) -> Result<Vec<ActivityEntry>, ApiError> {
        let collection = self.mongo.collection::<ActivityEntry>("activity_log");
        let options = FindOptions::builder()
            .sort(doc! { "occurred_at": -1 })
            .limit(limit)
            .build();

        let mut cursor = collection
            .find(doc! { "student_id": student_id })
            .with_options(options)
            .await
            .context("Failed to query activity log")?;

        let mut entries = Vec::new();
        while let Some(entry) = cursor.try_next().await.context("Activity cursor error")? {
            entries.push(entry);
        }
        Ok(entries)
    }
}
