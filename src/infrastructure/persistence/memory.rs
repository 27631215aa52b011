//! In-process backends with the same transactional contract as the
//! `PostgreSQL` ones. Used when the service runs without a database in local
//! mode, and by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicI64, Ordering},
    },
};

use crate::domain::{
    entities::{
        Account, AccountId, AnalyticsEvent, ApiCredential, HashtagId, LoginIdentifier, MediaKind,
        NewAccount, NewPost, PostId, PostMedia, PostSummary, Profile, RegisteredAccount,
    },
    repositories::{
        AccountStore, AnalyticsError, AnalyticsRepository, CredentialStore, PersistenceError,
        PostStore, PostTransaction, StoreError,
    },
    value_objects::{ApiKeyValue, Hashtag},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A committed post row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPost {
    pub id: PostId,
    pub post: NewPost,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Rows {
    posts: Vec<StoredPost>,
    shares: Vec<(PostId, AccountId)>,
    poll_options: Vec<(PostId, String)>,
    media: Vec<(PostId, String, MediaKind)>,
    hashtag_links: Vec<(PostId, HashtagId)>,
}

impl Rows {
    fn append(&mut self, other: &mut Rows) {
        self.posts.append(&mut other.posts);
        self.shares.append(&mut other.shares);
        self.poll_options.append(&mut other.poll_options);
        self.media.append(&mut other.media);
        self.hashtag_links.append(&mut other.hashtag_links);
    }
}

/// A hashtag row plus the open transactions that resolved to it.
#[derive(Debug)]
struct TagRow {
    id: HashtagId,
    holders: usize,
    committed: bool,
}

#[derive(Debug, Default)]
struct Tables {
    rows: Rows,
    hashtags: HashMap<String, TagRow>,
}

/// Post store kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPostStore {
    tables: Arc<Mutex<Tables>>,
    next_post_id: Arc<AtomicI64>,
    next_hashtag_id: Arc<AtomicI64>,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posts(&self) -> Vec<StoredPost> {
        lock(&self.tables).rows.posts.clone()
    }

    pub fn post(&self, id: PostId) -> Option<StoredPost> {
        lock(&self.tables).rows.posts.iter().find(|p| p.id == id).cloned()
    }

    pub fn poll_options(&self, post: PostId) -> Vec<String> {
        lock(&self.tables)
            .rows
            .poll_options
            .iter()
            .filter(|(id, _)| *id == post)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn shares(&self) -> Vec<(PostId, AccountId)> {
        lock(&self.tables).rows.shares.clone()
    }

    pub fn hashtag_id(&self, tag: &str) -> Option<HashtagId> {
        lock(&self.tables).hashtags.get(tag).map(|row| row.id)
    }

    pub fn hashtag_count(&self) -> usize {
        lock(&self.tables).hashtags.len()
    }

    pub fn hashtag_links(&self) -> Vec<(PostId, HashtagId)> {
        lock(&self.tables).rows.hashtag_links.clone()
    }

    /// Rows across every post-related table, hashtags included.
    pub fn total_rows(&self) -> usize {
        let tables = lock(&self.tables);
        let rows = &tables.rows;
        rows.posts.len()
            + rows.shares.len()
            + rows.poll_options.len()
            + rows.media.len()
            + rows.hashtag_links.len()
            + tables.hashtags.len()
    }

    fn summarize(rows: &Rows, stored: &StoredPost) -> PostSummary {
        let post = &stored.post;
        let poll = post.poll.as_ref();
        PostSummary {
            post_id: stored.id,
            author: post.author,
            target: post.target,
            original_post: post.original_post,
            impressions: 0,
            views: 0,
            body: post.body.clone(),
            created_at: stored.created_at,
            updated_at: stored.created_at,
            location: post.location.clone(),
            is_poll: post.is_poll(),
            poll_question: poll.map(|p| p.question.clone()),
            poll_duration_type: poll.map(|p| p.duration.unit().as_str().to_string()),
            poll_duration_length: poll.map(|p| i32::try_from(p.duration.length()).unwrap_or(i32::MAX)),
            username: None,
            first_name: None,
            last_name: None,
            preferred_name: None,
            viewer_reaction: None,
            total_reactions: 0,
            total_comments: 0,
            total_shares: rows.shares.iter().filter(|(original, _)| *original == stored.id).count()
                as i64,
        }
    }

    fn involves(post: &StoredPost, account: AccountId) -> bool {
        post.post.author == account || post.post.target == Some(account)
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn begin(&self) -> Result<Box<dyn PostTransaction>, PersistenceError> {
        Ok(Box::new(InMemoryPostTransaction {
            store: self.clone(),
            staged: Rows::default(),
            staged_tags: Vec::new(),
            finished: false,
        }))
    }

    async fn list_posts(
        &self,
        account: AccountId,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostSummary>, PersistenceError> {
        let tables = lock(&self.tables);
        let mut posts: Vec<&StoredPost> =
            tables.rows.posts.iter().filter(|p| Self::involves(p, account)).collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(posts
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .map(|p| Self::summarize(&tables.rows, p))
            .collect())
    }

    async fn count_posts(&self, account: AccountId) -> Result<u64, PersistenceError> {
        let tables = lock(&self.tables);
        Ok(tables.rows.posts.iter().filter(|p| Self::involves(p, account)).count() as u64)
    }

    async fn post_media(&self, post: PostId) -> Result<PostMedia, PersistenceError> {
        let tables = lock(&self.tables);
        let mut media = PostMedia::default();
        for (_, url, kind) in tables.rows.media.iter().filter(|(id, _, _)| *id == post) {
            media.push(*kind, url.clone());
        }
        Ok(media)
    }

    async fn health_check(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Buffers writes until commit. Hashtag rows are shared immediately so
/// concurrent transactions agree on one identifier per tag; a row nobody has
/// committed survives until the last transaction holding it finishes.
pub struct InMemoryPostTransaction {
    store: InMemoryPostStore,
    staged: Rows,
    staged_tags: Vec<String>,
    finished: bool,
}

impl InMemoryPostTransaction {
    /// Release every tag this transaction resolved. On commit the rows become
    /// permanent; otherwise an uncommitted row goes with its last holder.
    fn release_tags(&mut self, tables: &mut Tables, committed: bool) {
        for tag in self.staged_tags.drain(..) {
            let Some(row) = tables.hashtags.get_mut(&tag) else {
                continue;
            };
            row.holders = row.holders.saturating_sub(1);
            row.committed |= committed;
            if row.holders == 0 && !row.committed {
                tables.hashtags.remove(&tag);
            }
        }
    }

    fn discard(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let store = self.store.clone();
        let mut tables = lock(&store.tables);
        self.release_tags(&mut tables, false);
    }
}

#[async_trait]
impl PostTransaction for InMemoryPostTransaction {
    async fn insert_post(&mut self, post: &NewPost) -> Result<PostId, PersistenceError> {
        let id = PostId::new(self.store.next_post_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.staged.posts.push(StoredPost { id, post: post.clone(), created_at: Utc::now() });
        Ok(id)
    }

    async fn insert_share(
        &mut self,
        original: PostId,
        sharer: AccountId,
    ) -> Result<(), PersistenceError> {
        self.staged.shares.push((original, sharer));
        Ok(())
    }

    async fn insert_poll_option(
        &mut self,
        post: PostId,
        text: &str,
    ) -> Result<(), PersistenceError> {
        self.staged.poll_options.push((post, text.to_string()));
        Ok(())
    }

    async fn insert_media(
        &mut self,
        post: PostId,
        url: &str,
        kind: MediaKind,
    ) -> Result<(), PersistenceError> {
        self.staged.media.push((post, url.to_string(), kind));
        Ok(())
    }

    async fn upsert_hashtag(&mut self, tag: &Hashtag) -> Result<HashtagId, PersistenceError> {
        let mut tables = lock(&self.store.tables);
        let next_id = &self.store.next_hashtag_id;
        let row = tables.hashtags.entry(tag.as_str().to_string()).or_insert_with(|| TagRow {
            id: HashtagId::new(next_id.fetch_add(1, Ordering::SeqCst) + 1),
            holders: 0,
            committed: false,
        });
        row.holders += 1;
        let id = row.id;
        self.staged_tags.push(tag.as_str().to_string());
        Ok(id)
    }

    async fn link_hashtag(&mut self, post: PostId, tag: HashtagId) -> Result<(), PersistenceError> {
        if self.staged.hashtag_links.contains(&(post, tag)) {
            return Err(PersistenceError::Constraint(format!(
                "post {post} is already linked to hashtag {}",
                tag.as_i64()
            )));
        }
        self.staged.hashtag_links.push((post, tag));
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), PersistenceError> {
        let store = self.store.clone();
        let mut tables = lock(&store.tables);
        self.release_tags(&mut tables, true);
        tables.rows.append(&mut self.staged);
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), PersistenceError> {
        self.discard();
        Ok(())
    }
}

impl Drop for InMemoryPostTransaction {
    fn drop(&mut self) {
        self.discard();
    }
}

/// Credential store kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    credentials: Arc<Mutex<HashMap<(AccountId, String), ApiCredential>>>,
    account_keys: Arc<Mutex<HashMap<AccountId, String>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the credential and make it the owner's current account key.
    pub fn insert(&self, credential: ApiCredential) {
        lock(&self.account_keys).insert(credential.owner, credential.key.as_str().to_string());
        self.insert_credential_row(credential);
    }

    /// Store the credential row without touching the account record.
    pub fn insert_credential_row(&self, credential: ApiCredential) {
        lock(&self.credentials)
            .insert((credential.owner, credential.key.as_str().to_string()), credential);
    }

    pub fn set_account_key(&self, owner: AccountId, key: &ApiKeyValue) {
        lock(&self.account_keys).insert(owner, key.as_str().to_string());
    }

    pub fn last_used(&self, owner: AccountId, key: &ApiKeyValue) -> Option<DateTime<Utc>> {
        lock(&self.credentials)
            .get(&(owner, key.as_str().to_string()))
            .and_then(|credential| credential.last_used_at)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_credential(
        &self,
        owner: AccountId,
        key: &ApiKeyValue,
    ) -> Result<Option<ApiCredential>, StoreError> {
        Ok(lock(&self.credentials).get(&(owner, key.as_str().to_string())).cloned())
    }

    async fn account_holds_key(
        &self,
        owner: AccountId,
        key: &ApiKeyValue,
    ) -> Result<bool, StoreError> {
        Ok(lock(&self.account_keys).get(&owner).is_some_and(|current| current == key.as_str()))
    }

    async fn touch_last_used(
        &self,
        owner: AccountId,
        key: &ApiKeyValue,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(credential) = lock(&self.credentials).get_mut(&(owner, key.as_str().to_string()))
        {
            credential.last_used_at = Some(at);
        }
        Ok(())
    }
}

/// Account store kept in process memory. Keys it issues are written through
/// the wrapped credential store, so the authentication gate sees them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountStore {
    credentials: InMemoryCredentialStore,
    accounts: Arc<Mutex<Vec<Account>>>,
    next_profile_id: Arc<AtomicI64>,
}

impl InMemoryAccountStore {
    pub fn new(credentials: InMemoryCredentialStore) -> Self {
        Self { credentials, ..Self::default() }
    }

    pub fn accounts(&self) -> Vec<Account> {
        lock(&self.accounts).clone()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn register(
        &self,
        account: &NewAccount,
        now: DateTime<Utc>,
    ) -> Result<RegisteredAccount, PersistenceError> {
        let mut accounts = lock(&self.accounts);
        if let Some(taken) = accounts
            .iter()
            .find(|a| a.email == account.email || a.username == account.username)
        {
            let field = if taken.email == account.email { "email" } else { "username" };
            return Err(PersistenceError::Constraint(format!("duplicate {field}")));
        }

        let id = AccountId::new(accounts.len() as i64 + 1);
        let credential = ApiCredential::issue(id, now);
        let stored = Account {
            id,
            email: account.email.clone(),
            username: account.username.clone(),
            password_hash: account.password_hash.clone(),
            api_key: Some(credential.key.clone()),
            created_at: now,
            updated_at: now,
        };
        accounts.push(stored.clone());
        drop(accounts);

        self.credentials.insert(credential.clone());
        let profile = Profile {
            id: self.next_profile_id.fetch_add(1, Ordering::SeqCst) + 1,
            account: id,
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
        Ok(lock(&self.accounts)
            .iter()
            .find(|a| match identifier {
                LoginIdentifier::Email(email) => &a.email == email,
                LoginIdentifier::Username(username) => &a.username == username,
            })
            .cloned())
    }

    async fn current_credential(
        &self,
        account: AccountId,
    ) -> Result<Option<ApiCredential>, PersistenceError> {
        let Some(key) = lock(&self.credentials.account_keys).get(&account).cloned() else {
            return Ok(None);
        };
        Ok(lock(&self.credentials.credentials).get(&(account, key)).cloned())
    }

    async fn rotate_key(&self, credential: &ApiCredential) -> Result<(), PersistenceError> {
        self.credentials.insert(credential.clone());
        if let Some(account) = lock(&self.accounts).iter_mut().find(|a| a.id == credential.owner) {
            account.api_key = Some(credential.key.clone());
            account.updated_at = credential.created_at;
        }
        Ok(())
    }
}

/// Analytics repository that keeps events in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAnalyticsRepository {
    events: Arc<Mutex<Vec<AnalyticsEvent>>>,
}

impl InMemoryAnalyticsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        lock(&self.events).clone()
    }
}

#[async_trait]
impl AnalyticsRepository for InMemoryAnalyticsRepository {
    async fn insert_event(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        event.metadata_json()?;
        lock(&self.events).push(event.clone());
        Ok(())
    }
}
