use std::sync::Arc;
use tracing::debug;

use crate::{
    application::dto::{ListPostsQuery, ListPostsResponse, ListedPostDto},
    domain::{entities::AccountId, repositories::PostStore},
    presentation::middleware::error::AppError,
};

/// Use case for paging through the posts an account authored or received
pub struct ListPostsUseCase {
    store: Arc<dyn PostStore>,
}

impl ListPostsUseCase {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, query: ListPostsQuery) -> Result<ListPostsResponse, AppError> {
        query.validate().map_err(|e| AppError::Validation { message: e.to_string() })?;

        let account = AccountId::new(query.id);
        let total_posts = self.store.count_posts(account).await?;
        let posts = self.store.list_posts(account, query.limit, query.offset()).await?;

        debug!(
            account = %account,
            page = query.page,
            returned = posts.len(),
            total_posts,
            "Listed posts"
        );

        Ok(ListPostsResponse {
            posts: posts.into_iter().map(ListedPostDto::from).collect(),
            limit: query.limit,
            page: query.page,
            total_posts,
            total_pages: total_posts.div_ceil(u64::from(query.limit)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ContentPipeline;
    use crate::domain::entities::NewPost;
    use crate::infrastructure::persistence::InMemoryPostStore;
    use claims::{assert_matches, assert_ok};
    use std::time::Duration;

    async fn seeded(author: i64, count: usize) -> InMemoryPostStore {
        let store = InMemoryPostStore::new();
        let pipeline = ContentPipeline::new(Arc::new(store.clone()), Duration::from_secs(5));
        for i in 0..count {
            let post = NewPost::new(AccountId::new(author), format!("post {i}"));
            pipeline.create_post(&post).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn pages_are_counted_and_sliced() {
        let store = seeded(9, 5).await;
        let use_case = ListPostsUseCase::new(Arc::new(store));

        let first = assert_ok!(use_case.execute(ListPostsQuery { id: 9, limit: 2, page: 1 }).await);
        assert_eq!(first.posts.len(), 2);
        assert_eq!(first.total_posts, 5);
        assert_eq!(first.total_pages, 3);

        let last = assert_ok!(use_case.execute(ListPostsQuery { id: 9, limit: 2, page: 3 }).await);
        assert_eq!(last.posts.len(), 1);
        assert!(last.posts.iter().all(|p| p.user_id == 9));
    }

    #[tokio::test]
    async fn other_accounts_see_nothing() {
        let use_case = ListPostsUseCase::new(Arc::new(seeded(9, 2).await));

        let page = assert_ok!(use_case.execute(ListPostsQuery { id: 10, limit: 5, page: 1 }).await);
        assert!(page.posts.is_empty());
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn invalid_paging_is_a_validation_error() {
        let use_case = ListPostsUseCase::new(Arc::new(InMemoryPostStore::new()));

        let result = use_case.execute(ListPostsQuery { id: 1, limit: 0, page: 1 }).await;
        assert_matches!(result, Err(AppError::Validation { .. }));
    }
}
