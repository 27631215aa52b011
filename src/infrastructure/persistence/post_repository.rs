use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::domain::{
    entities::{
        AccountId, HashtagId, Location, MediaKind, NewPost, PostId, PostMedia, PostSummary,
    },
    repositories::{PersistenceError, PostStore, PostTransaction},
    value_objects::Hashtag,
};

/// `PostgreSQL` post storage
pub struct PostgresPostStore {
    pool: PgPool,
}

impl PostgresPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PostgresPostStore {
    async fn begin(&self) -> Result<Box<dyn PostTransaction>, PersistenceError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresPostTransaction { tx }))
    }

    async fn list_posts(
        &self,
        account: AccountId,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostSummary>, PersistenceError> {
        let rows = sqlx::query(
            r"
            SELECT
                p.post_id, p.user_id, p.to_user_id, p.original_post_id,
                p.impressions, p.views, p.content_text, p.created_at, p.updated_at,
                p.location_name, p.location_lat, p.location_lng,
                p.is_poll, p.poll_question, p.poll_duration_type, p.poll_duration_length,
                u.username, up.first_name, up.last_name, up.preferred_name,
                ur.reaction_type AS user_reaction,
                (SELECT COUNT(*) FROM post_reactions r WHERE r.post_id = p.post_id) AS total_reactions,
                (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.post_id) AS total_comments,
                (SELECT COUNT(*) FROM post_shares s WHERE s.post_id = p.post_id) AS total_post_shares
            FROM posts p
            LEFT JOIN users u ON u.user_id = p.user_id
            LEFT JOIN user_profiles up ON up.user_id = p.user_id
            LEFT JOIN post_reactions ur ON ur.post_id = p.post_id AND ur.user_id = $1
            WHERE p.user_id = $1 OR p.to_user_id = $1
            ORDER BY p.created_at DESC, p.post_id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(account.as_i64())
        .bind(i64::from(limit))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_row_to_summary).collect())
    }

    async fn count_posts(&self, account: AccountId) -> Result<u64, PersistenceError> {
        let total: i64 =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE user_id = $1 OR to_user_id = $1")
                .bind(account.as_i64())
                .fetch_one(&self.pool)
                .await?;

        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn post_media(&self, post: PostId) -> Result<PostMedia, PersistenceError> {
        let rows = sqlx::query(
            r"
            SELECT media_url, media_type
            FROM post_media
            WHERE post_id = $1
            ORDER BY post_media_id
            ",
        )
        .bind(post.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let mut media = PostMedia::default();
        for row in &rows {
            let kind: String = row.get("media_type");
            if let Some(kind) = MediaKind::from_db(&kind) {
                media.push(kind, row.get("media_url"));
            }
        }
        Ok(media)
    }

    async fn health_check(&self) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

/// One post creation inside a `PostgreSQL` transaction. Dropping it without
/// committing rolls the transaction back.
pub struct PostgresPostTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PostTransaction for PostgresPostTransaction {
    async fn insert_post(&mut self, post: &NewPost) -> Result<PostId, PersistenceError> {
        let author = post.author.as_i64();
        let target = post.target.map(|t| t.as_i64());
        let body = post.body.as_deref();
        let location_name = post.location.name.as_deref();
        let (lat, lng) = (post.location.latitude, post.location.longitude);

        let id: i64 = match (post.original_post, &post.poll) {
            (None, None) => {
                sqlx::query_scalar::<_, i64>(
                    r"
                    INSERT INTO posts
                    (user_id, to_user_id, content_text, location_name, location_lat, location_lng, is_poll)
                    VALUES ($1, $2, $3, $4, $5, $6, FALSE)
                    RETURNING post_id
                    ",
                )
                .bind(author)
                .bind(target)
                .bind(body)
                .bind(location_name)
                .bind(lat)
                .bind(lng)
                .fetch_optional(&mut *self.tx)
                .await?
            }
            (Some(original), None) => {
                sqlx::query_scalar::<_, i64>(
                    r"
                    INSERT INTO posts
                    (user_id, to_user_id, original_post_id, content_text, location_name, location_lat, location_lng, is_poll)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE)
                    RETURNING post_id
                    ",
                )
                .bind(author)
                .bind(target)
                .bind(original.as_i64())
                .bind(body)
                .bind(location_name)
                .bind(lat)
                .bind(lng)
                .fetch_optional(&mut *self.tx)
                .await?
            }
            (None, Some(poll)) => {
                sqlx::query_scalar::<_, i64>(
                    r"
                    INSERT INTO posts
                    (user_id, to_user_id, content_text, location_name, location_lat, location_lng, is_poll,
                     poll_question, poll_duration_type, poll_duration_length)
                    VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $8, $9)
                    RETURNING post_id
                    ",
                )
                .bind(author)
                .bind(target)
                .bind(body)
                .bind(location_name)
                .bind(lat)
                .bind(lng)
                .bind(&poll.question)
                .bind(poll.duration.unit().as_str())
                .bind(i32::try_from(poll.duration.length()).unwrap_or(i32::MAX))
                .fetch_optional(&mut *self.tx)
                .await?
            }
            (Some(original), Some(poll)) => {
                sqlx::query_scalar::<_, i64>(
                    r"
                    INSERT INTO posts
                    (user_id, to_user_id, original_post_id, content_text, location_name, location_lat, location_lng,
                     is_poll, poll_question, poll_duration_type, poll_duration_length)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $9, $10)
                    RETURNING post_id
                    ",
                )
                .bind(author)
                .bind(target)
                .bind(original.as_i64())
                .bind(body)
                .bind(location_name)
                .bind(lat)
                .bind(lng)
                .bind(&poll.question)
                .bind(poll.duration.unit().as_str())
                .bind(i32::try_from(poll.duration.length()).unwrap_or(i32::MAX))
                .fetch_optional(&mut *self.tx)
                .await?
            }
        }
        .ok_or(PersistenceError::MissingGeneratedKey("posts"))?;

        Ok(PostId::new(id))
    }

    async fn insert_share(
        &mut self,
        original: PostId,
        sharer: AccountId,
    ) -> Result<(), PersistenceError> {
        sqlx::query("INSERT INTO post_shares (post_id, user_id) VALUES ($1, $2)")
            .bind(original.as_i64())
            .bind(sharer.as_i64())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_poll_option(
        &mut self,
        post: PostId,
        text: &str,
    ) -> Result<(), PersistenceError> {
        sqlx::query("INSERT INTO poll_options (post_id, option_text, vote_count) VALUES ($1, $2, 0)")
            .bind(post.as_i64())
            .bind(text)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_media(
        &mut self,
        post: PostId,
        url: &str,
        kind: MediaKind,
    ) -> Result<(), PersistenceError> {
        sqlx::query("INSERT INTO post_media (post_id, media_url, media_type) VALUES ($1, $2, $3)")
            .bind(post.as_i64())
            .bind(url)
            .bind(kind.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn upsert_hashtag(&mut self, tag: &Hashtag) -> Result<HashtagId, PersistenceError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let id: Option<i64> = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO hashtags (tag) VALUES ($1)
            ON CONFLICT (tag) DO UPDATE SET tag = EXCLUDED.tag
            RETURNING hashtag_id
            ",
        )
        .bind(tag.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        id.map(HashtagId::new).ok_or(PersistenceError::MissingGeneratedKey("hashtags"))
    }

    async fn link_hashtag(&mut self, post: PostId, tag: HashtagId) -> Result<(), PersistenceError> {
        sqlx::query("INSERT INTO post_hashtags (post_id, hashtag_id) VALUES ($1, $2)")
            .bind(post.as_i64())
            .bind(tag.as_i64())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PersistenceError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PersistenceError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn map_row_to_summary(row: &PgRow) -> PostSummary {
    PostSummary {
        post_id: PostId::new(row.get("post_id")),
        author: AccountId::new(row.get("user_id")),
        target: row.get::<Option<i64>, _>("to_user_id").map(AccountId::new),
        original_post: row.get::<Option<i64>, _>("original_post_id").map(PostId::new),
        impressions: row.get("impressions"),
        views: row.get("views"),
        body: row.get("content_text"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        location: Location {
            name: row.get("location_name"),
            latitude: row.get("location_lat"),
            longitude: row.get("location_lng"),
        },
        is_poll: row.get("is_poll"),
        poll_question: row.get("poll_question"),
        poll_duration_type: row.get("poll_duration_type"),
        poll_duration_length: row.get("poll_duration_length"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        preferred_name: row.get("preferred_name"),
        viewer_reaction: row.get("user_reaction"),
        total_reactions: row.get("total_reactions"),
        total_comments: row.get("total_comments"),
        total_shares: row.get("total_post_shares"),
    }
}
