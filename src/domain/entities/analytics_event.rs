use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use crate::domain::entities::{AccountId, PostId};

/// A usage event recorded after the fact by the analytics worker pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    pub account_id: AccountId,
    pub event_type: String,
    pub object_type: Option<String>,
    pub object_id: Option<i64>,
    pub occurred_at: DateTime<Utc>,
    pub metadata: Option<Value>,
}

impl AnalyticsEvent {
    #[must_use]
    pub fn new(account_id: AccountId, event_type: impl Into<String>) -> Self {
        Self {
            account_id,
            event_type: event_type.into(),
            object_type: None,
            object_id: None,
            occurred_at: Utc::now(),
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_object(mut self, object_type: impl Into<String>, object_id: i64) -> Self {
        self.object_type = Some(object_type.into());
        self.object_id = Some(object_id);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// `create_post` event for a freshly persisted post.
    #[must_use]
    pub fn post_created(author: AccountId, post: PostId) -> Self {
        Self::new(author, "create_post").with_object("post", post.as_i64())
    }

    /// `share_post` event attributed to the original post.
    #[must_use]
    pub fn post_shared(author: AccountId, original: PostId, new_post: PostId) -> Self {
        Self::new(author, "share_post")
            .with_object("post", original.as_i64())
            .with_metadata(json!({ "shared_post_id": new_post.as_i64() }))
    }

    /// `create_account` event for a newly registered account.
    #[must_use]
    pub fn account_created(account: AccountId, email: &str, username: &str) -> Self {
        Self::new(account, "create_account")
            .with_object("user", account.as_i64())
            .with_metadata(json!({ "email": email, "username": username }))
    }

    /// `create_profile` event for the profile made at registration.
    #[must_use]
    pub fn profile_created(account: AccountId, profile_id: i64, preferred_name: Option<&str>) -> Self {
        Self::new(account, "create_profile")
            .with_object("user_profile", profile_id)
            .with_metadata(json!({ "preferredName": preferred_name }))
    }

    /// `login` event for a successful password check.
    #[must_use]
    pub fn logged_in(account: AccountId, email: &str, username: &str) -> Self {
        Self::new(account, "login")
            .with_object("user", account.as_i64())
            .with_metadata(json!({ "email": email, "username": username }))
    }

    /// Metadata rendered as the JSON text stored in `analytics_events.metadata`.
    pub fn metadata_json(&self) -> Result<Option<String>, serde_json::Error> {
        self.metadata.as_ref().map(serde_json::to_string).transpose()
    }
}
