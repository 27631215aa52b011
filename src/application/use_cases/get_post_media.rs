use std::sync::Arc;

use crate::{
    application::dto::PostMediaResponse,
    domain::{entities::PostId, repositories::PostStore},
    presentation::middleware::error::AppError,
};

/// Use case for fetching the image and video URLs attached to a post
pub struct GetPostMediaUseCase {
    store: Arc<dyn PostStore>,
}

impl GetPostMediaUseCase {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, post_id: PostId) -> Result<PostMediaResponse, AppError> {
        if post_id.as_i64() <= 0 {
            return Err(AppError::BadRequest { message: "Invalid post id".to_string() });
        }
        Ok(self.store.post_media(post_id).await?.into())
    }
}
