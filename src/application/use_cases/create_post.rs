use tracing::info;

use crate::{
    application::{ContentPipeline, PipelineError, dto::CreatePostRequest},
    domain::entities::{AnalyticsEvent, PostId},
    infrastructure::analytics::AnalyticsSink,
};

/// Use case for creating a post and recording its analytics
#[derive(Clone)]
pub struct CreatePostUseCase {
    pipeline: ContentPipeline,
    analytics: AnalyticsSink,
}

impl CreatePostUseCase {
    pub fn new(pipeline: ContentPipeline, analytics: AnalyticsSink) -> Self {
        Self { pipeline, analytics }
    }

    /// Validate, persist, then hand analytics off to the background workers.
    ///
    /// Analytics are recorded only after the post transaction commits and
    /// never affect the outcome returned to the caller.
    pub async fn execute(&self, request: CreatePostRequest) -> Result<PostId, PipelineError> {
        let post = request.into_command()?;
        let post_id = self.pipeline.create_post(&post).await?;

        self.analytics.record(AnalyticsEvent::post_created(post.author, post_id));
        if let Some(original) = post.original_post {
            info!(post_id = %post_id, original = %original, "Post is a reshare");
            self.analytics.record(AnalyticsEvent::post_shared(post.author, original, post_id));
        }

        Ok(post_id)
    }
}
