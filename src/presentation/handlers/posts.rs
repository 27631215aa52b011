use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    application::{
        PipelineError, ValidationError,
        dto::{CreatePostRequest, CreatePostResponse, ListPostsQuery, ListPostsResponse, PostMediaResponse},
        use_cases::{
            CreatePostUseCase, GetPostMediaUseCase, ListPostsUseCase, LoginUseCase,
            RegisterAccountUseCase,
        },
    },
    domain::{entities::PostId, repositories::PostStore},
    presentation::middleware::{AuthGate, JwtService, Principal, error::AppError},
};

/// Shared state handed to every handler and to the authentication gate
#[derive(Clone)]
pub struct AppState {
    pub create_post: Arc<CreatePostUseCase>,
    pub list_posts: Arc<ListPostsUseCase>,
    pub post_media: Arc<GetPostMediaUseCase>,
    pub register_account: Arc<RegisterAccountUseCase>,
    pub login: Arc<LoginUseCase>,
    pub tokens: Arc<JwtService>,
    pub auth_gate: AuthGate,
    pub posts: Arc<dyn PostStore>,
}

impl axum::extract::FromRef<AppState> for AuthGate {
    fn from_ref(state: &AppState) -> Self {
        state.auth_gate.clone()
    }
}

/// Create a post, its poll options, media, hashtags and share record
///
/// # Errors
/// Returns 400 with `success: false` for invalid input, and an error body
/// for storage failures or a write that exceeds its deadline
pub async fn create_post(
    State(state): State<AppState>,
    principal: Principal,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let error = ValidationError::MalformedBody(rejection.body_text());
            debug!(reason = %error, "Create post body could not be decoded");
            return Ok(rejected(&error));
        }
    };

    if principal.account_id.as_i64() != request.user_id {
        debug!(
            principal = %principal.account_id,
            author = request.user_id,
            "Post author differs from the authenticated account"
        );
    }

    match state.create_post.execute(request).await {
        Ok(post_id) => {
            info!(post_id = %post_id, "Create post request completed");
            Ok((StatusCode::OK, Json(CreatePostResponse::created(post_id))).into_response())
        }
        Err(PipelineError::Validation(e)) => {
            debug!(reason = %e, "Create post request rejected");
            Ok(rejected(&e))
        }
        Err(e) => Err(e.into()),
    }
}

fn rejected(error: &ValidationError) -> Response {
    (StatusCode::BAD_REQUEST, Json(CreatePostResponse::rejected(error))).into_response()
}

/// List posts authored by or addressed to an account
///
/// # Errors
/// Returns 400 for out-of-range paging and 500/503 for storage failures
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<ListPostsResponse>, AppError> {
    state.list_posts.execute(query).await.map(Json)
}

/// Image and video URLs attached to a post
///
/// # Errors
/// Returns 400 for a non-positive id and 500/503 for storage failures
pub async fn get_post_media(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<PostMediaResponse>, AppError> {
    state.post_media.execute(PostId::new(post_id)).await.map(Json)
}
