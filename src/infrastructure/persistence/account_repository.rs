use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::info;

use crate::domain::{
    entities::{
        Account, AccountId, ApiCredential, LoginIdentifier, NewAccount, Profile, RegisteredAccount,
    },
    repositories::{AccountStore, PersistenceError},
    value_objects::ApiKeyValue,
};

const FIND_BY_EMAIL: &str = r"
    SELECT user_id, email, username, password_hash, api_key, created_at, updated_at
    FROM users
    WHERE email = $1
";

const FIND_BY_USERNAME: &str = r"
    SELECT user_id, email, username, password_hash, api_key, created_at, updated_at
    FROM users
    WHERE username = $1
";

/// `PostgreSQL` account storage over `users`, `user_profiles` and `api_keys`
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn store_key(
        tx: &mut Transaction<'static, Postgres>,
        credential: &ApiCredential,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            r"
            INSERT INTO api_keys (user_id, api_key, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(credential.owner.as_i64())
        .bind(credential.key.as_str())
        .bind(credential.created_at)
        .bind(credential.expires_at)
        .execute(&mut **tx)
        .await?;

        sqlx::query("UPDATE users SET api_key = $2, updated_at = $3 WHERE user_id = $1")
            .bind(credential.owner.as_i64())
            .bind(credential.key.as_str())
            .bind(credential.created_at)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn register(
        &self,
        account: &NewAccount,
        now: DateTime<Utc>,
    ) -> Result<RegisteredAccount, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r"
            INSERT INTO users (email, username, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING user_id, email, username, password_hash, api_key, created_at, updated_at
            ",
        )
        .bind(&account.email)
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let mut stored = map_row_to_account(&row);

        let credential = ApiCredential::issue(stored.id, now);
        Self::store_key(&mut tx, &credential).await?;
        stored.api_key = Some(credential.key.clone());

        let profile_id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO user_profiles (user_id, preferred_name, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING profile_id
            ",
        )
        .bind(stored.id.as_i64())
        .bind(account.preferred_name.as_deref())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(account = %stored.id, "Account registered");

        let profile = Profile {
            id: profile_id,
            account: stored.id,
            first_name: None,
            last_name: None,
            preferred_name: account.preferred_name.clone(),
            date_joined: now,
        };
        Ok(RegisteredAccount { account: stored, profile, credential })
    }

    async fn find_account(
        &self,
        identifier: &LoginIdentifier,
    ) -> Result<Option<Account>, PersistenceError> {
        let (query, value) = match identifier {
            LoginIdentifier::Email(email) => (FIND_BY_EMAIL, email),
            LoginIdentifier::Username(username) => (FIND_BY_USERNAME, username),
        };

        let row = sqlx::query(query).bind(value).fetch_optional(&self.pool).await?;

        Ok(row.as_ref().map(map_row_to_account))
    }

    async fn current_credential(
        &self,
        account: AccountId,
    ) -> Result<Option<ApiCredential>, PersistenceError> {
        let row = sqlx::query(
            r"
            SELECT k.user_id, k.api_key, k.created_at, k.expires_at, k.last_used_at
            FROM users u
            JOIN api_keys k ON k.user_id = u.user_id AND k.api_key = u.api_key
            WHERE u.user_id = $1
            ",
        )
        .bind(account.as_i64())
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

    async fn rotate_key(&self, credential: &ApiCredential) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;
        Self::store_key(&mut tx, credential).await?;
        tx.commit().await?;

        info!(account = %credential.owner, key = %credential.key, "API key rotated");
        Ok(())
    }
}

fn map_row_to_account(row: &PgRow) -> Account {
    Account {
        id: AccountId::new(row.get("user_id")),
        email: row.get("email"),
        username: row.get("username"),
        password_hash: row.get::<Option<String>, _>("password_hash").unwrap_or_default(),
        api_key: row.get::<Option<String>, _>("api_key").map(ApiKeyValue::new),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
