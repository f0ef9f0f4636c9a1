use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::FindOptions, Database};
use redis::aio::ConnectionManager;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::chat::{ChatMessage, UnreadCount};
use crate::models::notification::NotificationKind;
use crate::services::notification_service::NotificationService;

pub struct ChatService {
    mongo: Database,
    redis: ConnectionManager,
}

impl ChatService {
    pub fn new(mongo: Database, redis: ConnectionManager) -> Self {
        Self { mongo, redis }
    }

    /// Store the message, bump the recipient's unread counter, and push a
    /// fire-and-forget notification. Only the message insert can fail the
    /// request; counters and notifications degrade to logs.
    pub async fn send_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        body: &str,
    ) -> Result<ChatMessage, ApiError> {
        if sender_id == recipient_id {
            return Err(ApiError::validation("Cannot message yourself"));
        }

        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            body: body.to_string(),
            sent_at: Utc::now(),
            read: false,
        };

        self.mongo
            .collection::<ChatMessage>("messages")
            .insert_one(&message)
            .await
            .context("Failed to store chat message")?;

        if let Err(e) = self.increment_unread(recipient_id, sender_id).await {
            tracing::warn!("Failed to bump unread counter: {:#}", e);
        }

        NotificationService::new(self.mongo.clone())
            .notify(
                recipient_id,
                NotificationKind::NewMessage,
                format!("New message from {}", sender_id),
            )
            .await;

        Ok(message)
    }

    /// Both directions of a conversation, oldest first.
    pub async fn conversation(
        &self,
        user_id: &str,
        counterpart_id: &str,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let collection = self.mongo.collection::<ChatMessage>("messages");
        let options = FindOptions::builder()
            .sort(doc! { "sent_at": 1 })
            .limit(500)
            .build();

        let mut cursor = collection
            .find(doc! {
                "$or": [
                    { "sender_id": user_id, "recipient_id": counterpart_id },
                    { "sender_id": counterpart_id, "recipient_id": user_id },
                ]
            })
            .with_options(options)
            .await
            .context("Failed to query conversation")?;

        let mut messages = Vec::new();
        while let Some(m) = cursor.try_next().await.context("Message cursor error")? {
            messages.push(m);
        }
        Ok(messages)
    }

    /// Per-sender unread counts from the Redis hash; falls back to counting
    /// unread rows in Mongo when Redis is unavailable.
    pub async fn unread_counts(&self, user_id: &str) -> Result<Vec<UnreadCount>, ApiError> {
        match self.unread_from_redis(user_id).await {
            Ok(counts) => Ok(counts),
            Err(e) => {
                tracing::warn!("Redis unread lookup failed, falling back to Mongo: {:#}", e);
                self.unread_from_mongo(user_id).await
            }
        }
    }

    /// Marks the counterpart's messages to this user as read and clears the
    /// unread counter.
    pub async fn mark_conversation_read(
        &self,
        user_id: &str,
        counterpart_id: &str,
    ) -> Result<u64, ApiError> {
        let collection = self.mongo.collection::<ChatMessage>("messages");
        let result = collection
            .update_many(
                doc! {
                    "sender_id": counterpart_id,
                    "recipient_id": user_id,
                    "read": false,
                },
                doc! { "$set": { "read": true } },
            )
            .await
            .context("Failed to mark conversation read")?;

        let mut conn = self.redis.clone();
        let key = format!("chat:unread:{}", user_id);
        if let Err(e) = redis::cmd("HDEL")
            .arg(&key)
            .arg(counterpart_id)
            .query_async::<()>(&mut conn)
            .await
        {
            tracing::warn!("Failed to clear unread counter: {}", e);
        }

        Ok(result.modified_count)
    }

    async fn increment_unread(&self, recipient_id: &str, sender_id: &str) -> anyhow::Result<()> {
        let mut conn = self.redis.clone();
        let key = format!("chat:unread:{}", recipient_id);

        redis::cmd("HINCRBY")
            .arg(&key)
            .arg(sender_id)
            .arg(1)
            .query_async::<i64>(&mut conn)
            .await
            .context("HINCRBY failed")?;

        // Counter is bookkeeping, not truth; expire stale hashes after a week
        redis::cmd("EXPIRE")
            .arg(&key)
            .arg(604800)
            .query_async::<()>(&mut conn)
            .await
            .context("EXPIRE failed")?;

        Ok(())
    }

    async fn unread_from_redis(&self, user_id: &str) -> anyhow::Result<Vec<UnreadCount>> {
        let mut conn = self.redis.clone();
        let key = format!("chat:unread:{}", user_id);

        let raw: Vec<(String, u64)> = redis::cmd("HGETALL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .context("HGETALL failed")?;

        Ok(raw
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(sender_id, count)| UnreadCount { sender_id, count })
            .collect())
    }

    async fn unread_from_mongo(&self, user_id: &str) -> Result<Vec<UnreadCount>, ApiError> {
        let collection = self.mongo.collection::<ChatMessage>("messages");
        let mut cursor = collection
            .find(doc! { "recipient_id": user_id, "read": false })
            .await
            .context("Failed to query unread messages")?;

        let mut by_sender: std::collections::HashMap<String, u64> =
            std::collections::HashMap::new();
        while let Some(m) = cursor.try_next().await.context("Message cursor error")? {
            *by_sender.entry(m.sender_id).or_insert(0) += 1;
        }

        Ok(by_sender
            .into_iter()
            .map(|(sender_id, count)| UnreadCount { sender_id, count })
            .collect())
    }
}
