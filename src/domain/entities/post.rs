use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    entities::AccountId,
    value_objects::{Hashtag, PollDuration},
};

/// Post identifier generated by storage on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(i64);

impl PostId {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PostId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a row in the shared hashtag table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashtagId(i64);

impl HashtagId {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// Optional place a post was made from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.latitude.is_none() && self.longitude.is_none()
    }
}

/// Poll attached to a post. Options are stored in the order given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSpec {
    pub question: String,
    pub duration: PollDuration,
    pub options: Vec<String>,
}

/// Kind of media attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    #[must_use]
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// The four row layouts a post insert can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostShape {
    Plain,
    Reshare,
    Poll,
    ResharedPoll,
}

/// Validated input for the content pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub author: AccountId,
    pub target: Option<AccountId>,
    pub original_post: Option<PostId>,
    pub body: Option<String>,
    pub location: Location,
    pub poll: Option<PollSpec>,
    pub images: Vec<String>,
    pub hashtags: Vec<Hashtag>,
}

impl NewPost {
    /// Plain post with no target, poll, media or tags.
    #[must_use]
    pub fn new(author: AccountId, body: impl Into<String>) -> Self {
        Self {
            author,
            target: None,
            original_post: None,
            body: Some(body.into()),
            location: Location::default(),
            poll: None,
            images: Vec::new(),
            hashtags: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_poll(&self) -> bool {
        self.poll.is_some()
    }

    #[must_use]
    pub fn shape(&self) -> PostShape {
        match (self.original_post.is_some(), self.poll.is_some()) {
            (false, false) => PostShape::Plain,
            (true, false) => PostShape::Reshare,
            (false, true) => PostShape::Poll,
            (true, true) => PostShape::ResharedPoll,
        }
    }
}

/// A post as shown in an account's feed listing, with engagement counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    pub post_id: PostId,
    pub author: AccountId,
    pub target: Option<AccountId>,
    pub original_post: Option<PostId>,
    pub impressions: i64,
    pub views: i64,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub location: Location,
    pub is_poll: bool,
    pub poll_question: Option<String>,
    pub poll_duration_type: Option<String>,
    pub poll_duration_length: Option<i32>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub preferred_name: Option<String>,
    pub viewer_reaction: Option<String>,
    pub total_reactions: i64,
    pub total_comments: i64,
    pub total_shares: i64,
}

/// Media URLs attached to one post, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostMedia {
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

impl PostMedia {
    pub fn push(&mut self, kind: MediaKind, url: String) {
        match kind {
            MediaKind::Image => self.images.push(url),
            MediaKind::Video => self.videos.push(url),
        }
    }
}
