use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{
    entities::AnalyticsEvent,
    repositories::{AnalyticsError, AnalyticsRepository},
};

/// Writes analytics events through a pool reserved for analytics workers
pub struct PostgresAnalyticsRepository {
    pool: PgPool,
}

impl PostgresAnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalyticsRepository for PostgresAnalyticsRepository {
    async fn insert_event(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        let metadata = event.metadata_json()?;

        sqlx::query(
            r"
            INSERT INTO analytics_events
            (user_id, event_type, object_type, object_id, event_time, metadata)
            VALUES ($1, $2, $3, $4, $5, $6::jsonb)
            ",
        )
        .bind(event.account_id.as_i64())
        .bind(&event.event_type)
        .bind(event.object_type.as_deref())
        .bind(event.object_id)
        .bind(event.occurred_at)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| AnalyticsError::Storage(e.to_string()))?;

        Ok(())
    }
}
