use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::FindOptions, Database};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::notification::{Notification, NotificationKind};

/// Fire-and-forget sink for domain events. `notify` never returns an error:
/// a failed insert is logged and must not block or roll back the progress
/// write that triggered it.
pub struct NotificationService {
    mongo: Database,
}

impl NotificationService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn notify(&self, recipient_id: &str, kind: NotificationKind, body: String) {
        let collection = self.mongo.collection::<Notification>("notifications");
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            recipient_id: recipient_id.to_string(),
            kind,
            body,
            created_at: Utc::now(),
            read: false,
        };

        if let Err(e) = collection.insert_one(&notification).await {
            tracing::error!(
                "Failed to store notification for recipient={}: {:#}",
                recipient_id,
                e
            );
        }
    }

    pub async fn list_for_user(&self, recipient_id: &str) -> Result<Vec<Notification>, ApiError> {
        let collection = self.mongo.collection::<Notification>("notifications");
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .limit(100)
            .build();

        let mut cursor = collection
            .find(doc! { "recipient_id": recipient_id })
            .with_options(options)
            .await
            .context("Failed to query notifications")?;

        let mut notifications = Vec::new();
        while let Some(n) = cursor
            .try_next()
            .await
            .context("Notification cursor error")?
        {
            notifications.push(n);
        }
        Ok(notifications)
    }

    pub async fn mark_read(
        &self,
        recipient_id: &str,
        notification_id: &str,
    ) -> Result<(), ApiError> {
        let collection = self.mongo.collection::<Notification>("notifications");
        let result = collection
            .update_one(
                doc! { "_id": notification_id, "recipient_id": recipient_id },
                doc! { "$set": { "read": true } },
            )
            .await
            .context("Failed to mark notification read")?;

        if result.matched_count == 0 {
            return Err(ApiError::not_found(format!(
                "Notification {} not found",
                notification_id
            )));
        }
        Ok(())
    }
}
