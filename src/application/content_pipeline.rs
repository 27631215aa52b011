use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

use super::{PipelineError, ValidationError};
use crate::domain::{
    entities::{MediaKind, NewPost, PostId},
    repositories::{PersistenceError, PostStore, PostTransaction},
};

/// Writes a post and everything attached to it as one atomic unit.
///
/// Either every row (post, share record, poll options, media, hashtag links)
/// becomes visible together, or none does. A write that exceeds the
/// configured deadline is abandoned and its transaction rolled back.
#[derive(Clone)]
pub struct ContentPipeline {
    store: Arc<dyn PostStore>,
    write_timeout: Duration,
}

impl ContentPipeline {
    pub fn new(store: Arc<dyn PostStore>, write_timeout: Duration) -> Self {
        Self { store, write_timeout }
    }

    pub async fn create_post(&self, post: &NewPost) -> Result<PostId, PipelineError> {
        if !post.author.is_valid() {
            return Err(ValidationError::InvalidAuthor.into());
        }

        // Dropping the in-flight future drops its transaction, which rolls back.
        // The commit itself is not raced against the deadline: once issued,
        // its outcome is the outcome of the request.
        let (tx, post_id) = match tokio::time::timeout(self.write_timeout, self.stage(post)).await {
            Ok(staged) => staged?,
            Err(_) => {
                warn!(
                    author = %post.author,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Post write timed out, transaction abandoned"
                );
                return Err(PipelineError::Timeout(self.write_timeout));
            }
        };

        if let Err(e) = tx.commit().await {
            error!(author = %post.author, error = %e, "Post transaction failed to commit");
            return Err(e.into());
        }

        info!(
            post_id = %post_id,
            author = %post.author,
            shape = ?post.shape(),
            hashtags = post.hashtags.len(),
            "Post created"
        );
        Ok(post_id)
    }

    /// Open a transaction and write every row, leaving the commit to the caller.
    async fn stage(
        &self,
        post: &NewPost,
    ) -> Result<(Box<dyn PostTransaction>, PostId), PipelineError> {
        let mut tx = self.store.begin().await?;

        match Self::apply(tx.as_mut(), post).await {
            Ok(post_id) => Ok((tx, post_id)),
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "Failed to roll back post transaction");
                }
                error!(author = %post.author, error = %e, "Post write failed, rolled back");
                Err(e.into())
            }
        }
    }

    async fn apply(tx: &mut dyn PostTransaction, post: &NewPost) -> Result<PostId, PersistenceError> {
        let post_id = tx.insert_post(post).await?;

        if let Some(original) = post.original_post {
            tx.insert_share(original, post.author).await?;
        }

        if let Some(poll) = &post.poll {
            for option in &poll.options {
                tx.insert_poll_option(post_id, option).await?;
            }
        }

        for url in &post.images {
            tx.insert_media(post_id, url, MediaKind::Image).await?;
        }

        for tag in &post.hashtags {
            let tag_id = tx.upsert_hashtag(tag).await?;
            tx.link_hashtag(post_id, tag_id).await?;
            debug!(post_id = %post_id, tag = %tag, "Linked hashtag");
        }

        Ok(post_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::AccountId;
    use crate::domain::value_objects::{Hashtag, PollDurationUnit};
    use crate::infrastructure::persistence::InMemoryPostStore;
    use crate::test_utils::{fixtures::poll_post, mocks::FaultyPostStore};
    use claims::{assert_matches, assert_ok};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn pipeline_over(store: &InMemoryPostStore) -> ContentPipeline {
        ContentPipeline::new(Arc::new(store.clone()), TIMEOUT)
    }

    #[tokio::test]
    async fn plain_post_is_persisted_without_poll_fields() {
        let store = InMemoryPostStore::new();
        let pipeline = pipeline_over(&store);

        let id = assert_ok!(pipeline.create_post(&NewPost::new(AccountId::new(42), "hello")).await);

        assert!(id.as_i64() > 0);
        let stored = store.post(id).unwrap();
        assert_eq!(stored.post.author, AccountId::new(42));
        assert_eq!(stored.post.body.as_deref(), Some("hello"));
        assert!(stored.post.poll.is_none());
        assert_eq!(store.total_rows(), 1);
    }

    #[tokio::test]
    async fn poll_post_stores_options_in_order() {
        let store = InMemoryPostStore::new();
        let pipeline = pipeline_over(&store);
        let mut post = poll_post(7, &["red", "blue"]);
        if let Some(poll) = post.poll.as_mut() {
            poll.question = "color?".to_string();
            poll.duration = crate::domain::value_objects::PollDuration::new(PollDurationUnit::Days, 3)
                .unwrap();
        }

        let id = assert_ok!(pipeline.create_post(&post).await);

        let stored = store.post(id).unwrap();
        let poll = stored.post.poll.unwrap();
        assert_eq!(poll.question, "color?");
        assert_eq!(poll.duration.unit(), PollDurationUnit::Days);
        assert_eq!(poll.duration.length(), 3);
        assert_eq!(store.poll_options(id), vec!["red", "blue"]);
    }

    #[tokio::test]
    async fn reshare_records_share_against_original_post() {
        let store = InMemoryPostStore::new();
        let pipeline = pipeline_over(&store);
        let mut post = NewPost::new(AccountId::new(5), "look at this");
        post.original_post = Some(PostId::new(99));

        let id = assert_ok!(pipeline.create_post(&post).await);

        assert_eq!(store.shares(), vec![(PostId::new(99), AccountId::new(5))]);
        assert_eq!(store.post(id).unwrap().post.original_post, Some(PostId::new(99)));
    }

    #[tokio::test]
    async fn non_positive_author_is_rejected_without_touching_storage() {
        let store = FaultyPostStore::new();
        let pipeline = ContentPipeline::new(Arc::new(store.clone()), TIMEOUT);

        for author in [0, -3] {
            let result = pipeline.create_post(&NewPost::new(AccountId::new(author), "x")).await;
            assert_matches!(result, Err(PipelineError::Validation(ValidationError::InvalidAuthor)));
        }

        assert_eq!(store.transactions_begun(), 0);
        assert_eq!(store.inner.total_rows(), 0);
    }

    #[tokio::test]
    async fn failure_between_poll_options_leaves_no_rows() {
        let store = FaultyPostStore::new().fail_on_poll_option(3);
        let pipeline = ContentPipeline::new(Arc::new(store.clone()), TIMEOUT);
        let mut post = poll_post(11, &["a", "b", "c", "d"]);
        post.images = vec!["https://cdn.example/1.png".to_string()];
        post.hashtags = vec![Hashtag::parse("fresh").unwrap()];

        let result = pipeline.create_post(&post).await;

        assert_matches!(result, Err(PipelineError::Persistence(_)));
        assert_eq!(store.inner.total_rows(), 0);
    }

    #[tokio::test]
    async fn poll_with_four_options_persists_all_of_them() {
        let store = FaultyPostStore::new();
        let pipeline = ContentPipeline::new(Arc::new(store.clone()), TIMEOUT);

        let id = assert_ok!(pipeline.create_post(&poll_post(11, &["a", "b", "c", "d"])).await);

        assert_eq!(store.inner.poll_options(id).len(), 4);
        assert_eq!(store.inner.total_rows(), 5);
    }

    #[tokio::test]
    async fn media_and_hashtags_are_attached() {
        let store = InMemoryPostStore::new();
        let pipeline = pipeline_over(&store);
        let mut post = NewPost::new(AccountId::new(3), "trip");
        post.images = vec!["a.png".to_string(), "b.png".to_string()];
        post.hashtags = Hashtag::parse_all(["#travel", "food"]);

        let id = assert_ok!(pipeline.create_post(&post).await);

        let media = store.post_media(id).await.unwrap();
        assert_eq!(media.images, vec!["a.png", "b.png"]);
        assert!(media.videos.is_empty());
        assert_eq!(store.hashtag_count(), 2);
        assert_eq!(store.hashtag_links().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_posts_with_same_new_tag_share_one_row() {
        let store = InMemoryPostStore::new();
        let pipeline = pipeline_over(&store);

        let mut first = NewPost::new(AccountId::new(1), "one");
        first.hashtags = vec![Hashtag::parse("#launch").unwrap()];
        let mut second = NewPost::new(AccountId::new(2), "two");
        second.hashtags = vec![Hashtag::parse("launch").unwrap()];

        let (a, b) = tokio::join!(pipeline.create_post(&first), pipeline.create_post(&second));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(store.hashtag_count(), 1);
        let tag_id = store.hashtag_id("launch").unwrap();
        let mut links = store.hashtag_links();
        links.sort();
        assert_eq!(links, vec![(a.min(b), tag_id), (a.max(b), tag_id)]);
    }

    #[tokio::test]
    async fn slow_write_times_out_and_rolls_back() {
        let store = FaultyPostStore::new().with_write_delay(Duration::from_millis(500));
        let pipeline = ContentPipeline::new(Arc::new(store.clone()), Duration::from_millis(20));

        let result = pipeline.create_post(&poll_post(4, &["x", "y"])).await;

        assert_matches!(result, Err(PipelineError::Timeout(_)));
        assert_eq!(store.inner.total_rows(), 0);
    }

    #[tokio::test]
    async fn slow_commit_is_not_cut_off_by_the_deadline() {
        let store = FaultyPostStore::new().with_commit_delay(Duration::from_millis(100));
        let pipeline = ContentPipeline::new(Arc::new(store.clone()), Duration::from_millis(20));

        let id = assert_ok!(pipeline.create_post(&poll_post(4, &["x", "y"])).await);

        assert!(store.inner.post(id).is_some());
        assert_eq!(store.inner.poll_options(id), vec!["x", "y"]);
    }
}
