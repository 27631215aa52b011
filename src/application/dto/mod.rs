mod accounts;

use serde::{Deserialize, Serialize};

use super::ValidationError;

use crate::domain::{
    entities::{AccountId, Location, NewPost, PollSpec, PostId, PostMedia, PostSummary},
    value_objects::{Hashtag, PollDuration, PollDurationUnit},
};

pub use accounts::{
    CreateUserRequest, CreateUserResponse, LoginRequest, LoginResponse, Registration,
};

/// Maximum page size accepted when listing posts
pub const MAX_PAGE_SIZE: u32 = 100;

const DEFAULT_PAGE_SIZE: u32 = 20;

/// Request body for creating a post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(rename = "userID", default)]
    pub user_id: i64,
    /// Non-positive values mean the post has no target account.
    #[serde(rename = "toUserID", default)]
    pub to_user_id: Option<i64>,
    #[serde(rename = "originalPostID", default)]
    pub original_post_id: Option<i64>,
    pub content_text: Option<String>,
    pub location_name: Option<String>,
    pub location_lat: Option<f64>,
    pub location_long: Option<f64>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub is_poll: bool,
    pub poll_question: Option<String>,
    pub poll_duration_type: Option<String>,
    pub poll_duration_length: Option<i64>,
    #[serde(default)]
    pub poll_options: Vec<String>,
}

impl CreatePostRequest {
    /// Check the request shape and build the pipeline input.
    ///
    /// Poll fields are only read when `isPoll` is set. The author id is
    /// carried through unchecked; the pipeline rejects non-positive ids.
    pub fn into_command(self) -> Result<NewPost, ValidationError> {
        let original_post = match self.original_post_id {
            Some(id) if id <= 0 => return Err(ValidationError::InvalidOriginalPost),
            other => other.map(PostId::new),
        };

        let poll = if self.is_poll {
            Some(Self::poll_spec(
                self.poll_question,
                self.poll_duration_type,
                self.poll_duration_length,
                self.poll_options,
            )?)
        } else {
            None
        };

        Ok(NewPost {
            author: AccountId::new(self.user_id),
            target: self.to_user_id.filter(|id| *id > 0).map(AccountId::new),
            original_post,
            body: self.content_text,
            location: Location {
                name: self.location_name.filter(|name| !name.trim().is_empty()),
                latitude: self.location_lat,
                longitude: self.location_long,
            },
            poll,
            images: self
                .images
                .into_iter()
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .collect(),
            hashtags: Hashtag::parse_all(self.hashtags.iter().map(String::as_str)),
        })
    }

    fn poll_spec(
        question: Option<String>,
        duration_type: Option<String>,
        duration_length: Option<i64>,
        options: Vec<String>,
    ) -> Result<PollSpec, ValidationError> {
        let question = question
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .ok_or(ValidationError::MissingPollQuestion)?;

        let (Some(unit), Some(length)) = (duration_type, duration_length) else {
            return Err(ValidationError::MissingPollDuration);
        };
        let unit = unit.parse::<PollDurationUnit>().map_err(ValidationError::InvalidPollDuration)?;
        let length = u32::try_from(length).map_err(|_| {
            ValidationError::InvalidPollDuration(format!("Invalid poll duration length: {length}"))
        })?;
        let duration =
            PollDuration::new(unit, length).map_err(ValidationError::InvalidPollDuration)?;

        if options.is_empty() {
            return Err(ValidationError::MissingPollOptions);
        }
        if options.iter().any(|option| option.trim().is_empty()) {
            return Err(ValidationError::BlankPollOption);
        }

        Ok(PollSpec { question, duration, options })
    }
}

/// Response body for post creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePostResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "postID", skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
}

impl CreatePostResponse {
    pub fn created(post_id: PostId) -> Self {
        Self {
            success: true,
            message: "Post created successfully".to_string(),
            post_id: Some(post_id.as_i64()),
        }
    }

    pub fn rejected(error: &ValidationError) -> Self {
        Self { success: false, message: error.to_string(), post_id: None }
    }
}

/// Query parameters for listing an account's posts
#[derive(Debug, Clone, Deserialize)]
pub struct ListPostsQuery {
    pub id: i64,
    #[serde(default = "default_page_size")]
    pub limit: u32,
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_page() -> u32 {
    1
}

impl ListPostsQuery {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id <= 0 {
            return Err(ValidationError::InvalidPagination("id must be a positive account id".into()));
        }
        if self.limit == 0 || self.limit > MAX_PAGE_SIZE {
            return Err(ValidationError::InvalidPagination(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.page == 0 {
            return Err(ValidationError::InvalidPagination("page must be at least 1".into()));
        }
        Ok(())
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One post in a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedPostDto {
    #[serde(rename = "postID")]
    pub post_id: i64,
    #[serde(rename = "userID")]
    pub user_id: i64,
    #[serde(rename = "toUserID")]
    pub to_user_id: Option<i64>,
    #[serde(rename = "originalPostID")]
    pub original_post_id: Option<i64>,
    pub impressions: i64,
    pub views: i64,
    pub content_text: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub location_name: Option<String>,
    pub location_lat: Option<f64>,
    pub location_long: Option<f64>,
    pub is_poll: bool,
    pub poll_question: Option<String>,
    pub poll_duration_type: Option<String>,
    pub poll_duration_length: Option<i32>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub preferred_name: Option<String>,
    pub user_reaction: Option<String>,
    pub total_reactions: i64,
    pub total_comments: i64,
    pub total_post_shares: i64,
}

impl From<PostSummary> for ListedPostDto {
    fn from(post: PostSummary) -> Self {
        Self {
            post_id: post.post_id.as_i64(),
            user_id: post.author.as_i64(),
            to_user_id: post.target.map(|t| t.as_i64()),
            original_post_id: post.original_post.map(|p| p.as_i64()),
            impressions: post.impressions,
            views: post.views,
            content_text: post.body,
            created_at: post.created_at.to_rfc3339(),
            updated_at: post.updated_at.to_rfc3339(),
            location_name: post.location.name,
            location_lat: post.location.latitude,
            location_long: post.location.longitude,
            is_poll: post.is_poll,
            poll_question: post.poll_question,
            poll_duration_type: post.poll_duration_type,
            poll_duration_length: post.poll_duration_length,
            username: post.username,
            first_name: post.first_name,
            last_name: post.last_name,
            preferred_name: post.preferred_name,
            user_reaction: post.viewer_reaction,
            total_reactions: post.total_reactions,
            total_comments: post.total_comments,
            total_post_shares: post.total_shares,
        }
    }
}

/// Response body for listing posts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPostsResponse {
    pub posts: Vec<ListedPostDto>,
    pub limit: u32,
    pub page: u32,
    pub total_posts: u64,
    pub total_pages: u64,
}

/// Response body for a post's media
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMediaResponse {
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

impl From<PostMedia> for PostMediaResponse {
    fn from(media: PostMedia) -> Self {
        Self { images: media.images, videos: media.videos }
    }
}
