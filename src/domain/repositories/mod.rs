use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::entities::{
    Account, AccountId, AnalyticsEvent, ApiCredential, HashtagId, LoginIdentifier, MediaKind,
    NewAccount, NewPost, PostId, PostMedia, PostSummary, RegisteredAccount,
};
use crate::domain::value_objects::{ApiKeyValue, Hashtag};

/// Failure of the credential store during authentication lookups.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("credential store query failed: {0}")]
    Query(String),

    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Failure while reading or writing posts.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("insert did not return a generated key for {0}")]
    MissingGeneratedKey(&'static str),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure while persisting an analytics event.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("failed to serialize event metadata: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to store analytics event: {0}")]
    Storage(String),
}

/// Read access to API credentials and the account table.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find the credential matching both the owner and the key.
    async fn find_credential(
        &self,
        owner: AccountId,
        key: &ApiKeyValue,
    ) -> Result<Option<ApiCredential>, StoreError>;

    /// Whether the account record itself lists `key` as its current key.
    async fn account_holds_key(&self, owner: AccountId, key: &ApiKeyValue)
    -> Result<bool, StoreError>;

    /// Record that the credential was used at `at`.
    async fn touch_last_used(
        &self,
        owner: AccountId,
        key: &ApiKeyValue,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Account records, their profiles and the keys issued to them.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create the account, its profile and its first API key as one unit of
    /// work. The key is issued with [`ApiCredential::issue`] once the account
    /// identifier is known. A taken email or username is a
    /// [`PersistenceError::Constraint`].
    async fn register(
        &self,
        account: &NewAccount,
        now: DateTime<Utc>,
    ) -> Result<RegisteredAccount, PersistenceError>;

    async fn find_account(
        &self,
        identifier: &LoginIdentifier,
    ) -> Result<Option<Account>, PersistenceError>;

    /// The credential the account record currently points at.
    async fn current_credential(
        &self,
        account: AccountId,
    ) -> Result<Option<ApiCredential>, PersistenceError>;

    /// Store `credential` and make it the owner's current key.
    async fn rotate_key(&self, credential: &ApiCredential) -> Result<(), PersistenceError>;
}

/// Entry point for post storage: opens write transactions and serves reads.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Open a unit of work. Nothing written through it is visible to other
    /// readers until [`PostTransaction::commit`] succeeds; dropping it without
    /// committing discards every write.
    async fn begin(&self) -> Result<Box<dyn PostTransaction>, PersistenceError>;

    /// Posts authored by or addressed to `account`, newest first.
    async fn list_posts(
        &self,
        account: AccountId,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostSummary>, PersistenceError>;

    /// Number of posts authored by or addressed to `account`.
    async fn count_posts(&self, account: AccountId) -> Result<u64, PersistenceError>;

    async fn post_media(&self, post: PostId) -> Result<PostMedia, PersistenceError>;

    async fn health_check(&self) -> Result<(), PersistenceError>;
}

/// Writes that make up one post creation.
#[async_trait]
pub trait PostTransaction: Send {
    /// Insert the post row and return its generated identifier.
    async fn insert_post(&mut self, post: &NewPost) -> Result<PostId, PersistenceError>;

    async fn insert_share(
        &mut self,
        original: PostId,
        sharer: AccountId,
    ) -> Result<(), PersistenceError>;

    /// Insert one poll option with a zero vote count.
    async fn insert_poll_option(&mut self, post: PostId, text: &str)
    -> Result<(), PersistenceError>;

    async fn insert_media(
        &mut self,
        post: PostId,
        url: &str,
        kind: MediaKind,
    ) -> Result<(), PersistenceError>;

    /// Insert the tag if absent and return its identifier. Must be atomic
    /// with respect to concurrent transactions upserting the same tag.
    async fn upsert_hashtag(&mut self, tag: &Hashtag) -> Result<HashtagId, PersistenceError>;

    async fn link_hashtag(&mut self, post: PostId, tag: HashtagId)
    -> Result<(), PersistenceError>;

    async fn commit(self: Box<Self>) -> Result<(), PersistenceError>;

    async fn rollback(self: Box<Self>) -> Result<(), PersistenceError>;
}

/// Durable sink for analytics events.
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn insert_event(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError>;
}
