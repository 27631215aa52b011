use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::warn;

use crate::domain::{
    entities::{AccountId, ApiCredential},
    repositories::{CredentialStore, StoreError},
    value_objects::ApiKeyValue,
};

/// `PostgreSQL` credential lookups over `api_keys` and `users`
pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn find_credential(
        &self,
        owner: AccountId,
        key: &ApiKeyValue,
    ) -> Result<Option<ApiCredential>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT user_id, api_key, created_at, expires_at, last_used_at
            FROM api_keys
            WHERE user_id = $1 AND api_key = $2
            ",
        )
        .bind(owner.as_i64())
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ApiCredential {
            owner: AccountId::new(row.get("user_id")),
            key: ApiKeyValue::new(row.get::<String, _>("api_key")),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
            last_used_at: row.get("last_used_at"),
        }))
    }

    async fn account_holds_key(
        &self,
        owner: AccountId,
        key: &ApiKeyValue,
    ) -> Result<bool, StoreError> {
        let holds: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1 AND api_key = $2)",
        )
        .bind(owner.as_i64())
        .bind(key.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(holds)
    }

    async fn touch_last_used(
        &self,
        owner: AccountId,
        key: &ApiKeyValue,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE api_keys SET last_used_at = $3 WHERE user_id = $1 AND api_key = $2")
                .bind(owner.as_i64())
                .bind(key.as_str())
                .bind(at)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            warn!(owner = %owner, key = %key, "No API key row updated for last-used time");
        }
        Ok(())
    }
}
