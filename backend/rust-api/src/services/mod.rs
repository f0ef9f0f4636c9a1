use crate::config::Config;
use mongodb::{
    bson::doc, options::IndexOptions, Client as MongoClient, Database, IndexModel,
};
use redis::aio::ConnectionManager;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub redis: ConnectionManager,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        // Create ConnectionManager with longer timeout
        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tracing::info!("Redis ConnectionManager created, testing with PING...");

        // Test connection
        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        ensure_indexes(&mongo).await?;

        Ok(Self {
            config,
            mongo,
            redis,
        })
    }
}

/// Unique indexes backing the domain invariants: one enrollment per
/// (student, course), one progress row per (student, chapter/ticket),
/// strictly increasing attempt numbers, and deduplicated achievements.
pub async fn ensure_indexes(mongo: &Database) -> anyhow::Result<()> {
    let unique = |keys: mongodb::bson::Document| {
        IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build()
    };

    mongo
        .collection::<mongodb::bson::Document>("enrollments")
        .create_index(unique(doc! { "student_id": 1, "course_id": 1 }))
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("chapter_progress")
        .create_index(unique(doc! { "student_id": 1, "chapter_id": 1 }))
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("project_enrollments")
        .create_index(unique(doc! { "student_id": 1, "project_id": 1 }))
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("ticket_progress")
        .create_index(unique(doc! { "student_id": 1, "ticket_id": 1 }))
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("quiz_attempts")
        .create_index(unique(
            doc! { "student_id": 1, "quiz_id": 1, "attempt_number": 1 },
        ))
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("achievements")
        .create_index(unique(
            doc! { "student_id": 1, "kind": 1, "related_entity_id": 1 },
        ))
        .await?;

    tracing::info!("MongoDB unique indexes ensured");
    Ok(())
}

pub mod achievement_service;
pub mod attempt_service;
pub mod chat_service;
pub mod enrollment_service;
pub mod event_worker;
pub mod grading;
pub mod notification_service;
pub mod progress_service;
pub mod project_service;
pub mod recommendation_service;
