#[cfg(test)]
pub mod mocks {
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use std::time::Duration;

    use crate::domain::{
        entities::{
            AccountId, AnalyticsEvent, HashtagId, MediaKind, NewPost, PostId, PostMedia,
            PostSummary,
        },
        repositories::{
            AnalyticsError, AnalyticsRepository, CredentialStore, PersistenceError, PostStore,
            PostTransaction, StoreError,
        },
        value_objects::{ApiKeyValue, Hashtag},
    };
    use crate::domain::entities::ApiCredential;
    use crate::infrastructure::persistence::{InMemoryCredentialStore, InMemoryPostStore};

    /// Wraps the in-memory post store with injectable faults.
    #[derive(Clone, Default)]
    pub struct FaultyPostStore {
        pub inner: InMemoryPostStore,
        fail_on_poll_option: Option<usize>,
        write_delay: Option<Duration>,
        commit_delay: Option<Duration>,
        begun: Arc<AtomicUsize>,
    }

    impl FaultyPostStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the `n`th poll option insert (1-based) of every transaction.
        #[must_use]
        pub fn fail_on_poll_option(mut self, n: usize) -> Self {
            self.fail_on_poll_option = Some(n);
            self
        }

        /// Sleep before the post row insert.
        #[must_use]
        pub fn with_write_delay(mut self, delay: Duration) -> Self {
            self.write_delay = Some(delay);
            self
        }

        /// Sleep before committing.
        #[must_use]
        pub fn with_commit_delay(mut self, delay: Duration) -> Self {
            self.commit_delay = Some(delay);
            self
        }

        pub fn transactions_begun(&self) -> usize {
            self.begun.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PostStore for FaultyPostStore {
        async fn begin(&self) -> Result<Box<dyn PostTransaction>, PersistenceError> {
            self.begun.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FaultyTransaction {
                inner: self.inner.begin().await?,
                fail_on_poll_option: self.fail_on_poll_option,
                write_delay: self.write_delay,
                commit_delay: self.commit_delay,
                poll_options_seen: 0,
            }))
        }

        async fn list_posts(
            &self,
            account: AccountId,
            limit: u32,
            offset: u64,
        ) -> Result<Vec<PostSummary>, PersistenceError> {
            self.inner.list_posts(account, limit, offset).await
        }

        async fn count_posts(&self, account: AccountId) -> Result<u64, PersistenceError> {
            self.inner.count_posts(account).await
        }

        async fn post_media(&self, post: PostId) -> Result<PostMedia, PersistenceError> {
            self.inner.post_media(post).await
        }

        async fn health_check(&self) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    struct FaultyTransaction {
        inner: Box<dyn PostTransaction>,
        fail_on_poll_option: Option<usize>,
        write_delay: Option<Duration>,
        commit_delay: Option<Duration>,
        poll_options_seen: usize,
    }

    #[async_trait]
    impl PostTransaction for FaultyTransaction {
        async fn insert_post(&mut self, post: &NewPost) -> Result<PostId, PersistenceError> {
            if let Some(delay) = self.write_delay {
                tokio::time::sleep(delay).await;
            }
            self.inner.insert_post(post).await
        }

        async fn insert_share(
            &mut self,
            original: PostId,
            sharer: AccountId,
        ) -> Result<(), PersistenceError> {
            self.inner.insert_share(original, sharer).await
        }

        async fn insert_poll_option(
            &mut self,
            post: PostId,
            text: &str,
        ) -> Result<(), PersistenceError> {
            self.poll_options_seen += 1;
            if self.fail_on_poll_option == Some(self.poll_options_seen) {
                return Err(PersistenceError::Query("injected poll option failure".to_string()));
            }
            self.inner.insert_poll_option(post, text).await
        }

        async fn insert_media(
            &mut self,
            post: PostId,
            url: &str,
            kind: MediaKind,
        ) -> Result<(), PersistenceError> {
            self.inner.insert_media(post, url, kind).await
        }

        async fn upsert_hashtag(&mut self, tag: &Hashtag) -> Result<HashtagId, PersistenceError> {
            self.inner.upsert_hashtag(tag).await
        }

        async fn link_hashtag(
            &mut self,
            post: PostId,
            tag: HashtagId,
        ) -> Result<(), PersistenceError> {
            self.inner.link_hashtag(post, tag).await
        }

        async fn commit(self: Box<Self>) -> Result<(), PersistenceError> {
            if let Some(delay) = self.commit_delay {
                tokio::time::sleep(delay).await;
            }
            self.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> Result<(), PersistenceError> {
            self.inner.rollback().await
        }
    }

    /// Analytics repository whose writes always fail.
    #[derive(Clone, Default)]
    pub struct FailingAnalyticsRepository {
        pub attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AnalyticsRepository for FailingAnalyticsRepository {
        async fn insert_event(&self, _event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(AnalyticsError::Storage("analytics database is down".to_string()))
        }
    }

    /// Analytics repository whose writes never complete.
    #[derive(Clone, Default)]
    pub struct StalledAnalyticsRepository;

    #[async_trait]
    impl AnalyticsRepository for StalledAnalyticsRepository {
        async fn insert_event(&self, _event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    /// Credential store that answers after a fixed delay.
    #[derive(Clone)]
    pub struct SlowCredentialStore {
        pub inner: InMemoryCredentialStore,
        pub delay: Duration,
    }

    #[async_trait]
    impl CredentialStore for SlowCredentialStore {
        async fn find_credential(
            &self,
            owner: AccountId,
            key: &ApiKeyValue,
        ) -> Result<Option<ApiCredential>, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.find_credential(owner, key).await
        }

        async fn account_holds_key(
            &self,
            owner: AccountId,
            key: &ApiKeyValue,
        ) -> Result<bool, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.account_holds_key(owner, key).await
        }

        async fn touch_last_used(
            &self,
            owner: AccountId,
            key: &ApiKeyValue,
            at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.inner.touch_last_used(owner, key, at).await
        }
    }

    /// Credential store that is unreachable.
    #[derive(Clone, Default)]
    pub struct UnavailableCredentialStore;

    #[async_trait]
    impl CredentialStore for UnavailableCredentialStore {
        async fn find_credential(
            &self,
            _owner: AccountId,
            _key: &ApiKeyValue,
        ) -> Result<Option<ApiCredential>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn account_holds_key(
            &self,
            _owner: AccountId,
            _key: &ApiKeyValue,
        ) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn touch_last_used(
            &self,
            _owner: AccountId,
            _key: &ApiKeyValue,
            _at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }
}

#[cfg(test)]
pub mod fixtures {
    use chrono::Utc;

    use crate::domain::{
        entities::{AccountId, ApiCredential, NewPost},
        entities::PollSpec,
        value_objects::{PollDuration, PollDurationUnit},
    };
    use crate::infrastructure::{config::AnalyticsConfig, persistence::InMemoryCredentialStore};

    pub fn analytics_config(queue_capacity: usize, workers: usize) -> AnalyticsConfig {
        AnalyticsConfig { queue_capacity, workers, max_connections: 1, shutdown_grace_seconds: 5 }
    }

    /// A credential store holding one freshly issued key for `owner`.
    pub fn seeded_credentials(owner: i64) -> (InMemoryCredentialStore, ApiCredential) {
        let store = InMemoryCredentialStore::new();
        let credential = ApiCredential::issue(AccountId::new(owner), Utc::now());
        store.insert(credential.clone());
        (store, credential)
    }

    pub fn poll_post(author: i64, options: &[&str]) -> NewPost {
        let mut post = NewPost::new(AccountId::new(author), "Which one?");
        post.poll = Some(PollSpec {
            question: "Which one?".to_string(),
            duration: PollDuration::new(PollDurationUnit::Days, 1).unwrap(),
            options: options.iter().map(ToString::to_string).collect(),
        });
        post
    }
}
