use crate::record::{
    AuthenticationRecord, CommentRecord, CredentialsRecord, PostRecord, UserRecord,
    UserStatsRecord,
};
use async_trait::async_trait;
use posthorn_common::{
    feed::{FeedScope, Page, PageNumber, PageWindow},
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenHash, Authentication, HashedPassword},
        comment::{Comment, CommentCreated, CreateComment},
        post::{CreatePost, Post, PostContent, PostDeletionSnapshot, PostMarker},
        relation::{FollowState, LikeState},
        user::{CreateUser, User, UserHandle, UserMarker, UserStats},
    },
    store::Store,
};
use sqlx::{PgPool, Postgres, QueryBuilder, migrate::MigrateError, query, query_as, query_scalar};
use thiserror::Error;
use tracing::{debug, info};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Applying migrations failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Row locks taken by the toggles and by comment creation. The toggles conflict with each other
/// but not with key share locks, so foreign key checks and new comments are never held up.
/// Only a delete excludes a key share lock.
const LOCK_FOLLOWEE: &str =
    "SELECT user_id FROM users.users WHERE user_id = $1 FOR NO KEY UPDATE";
const LOCK_LIKED_POST: &str =
    "SELECT user_id FROM posts.posts WHERE post_id = $1 FOR NO KEY UPDATE";
const LOCK_COMMENTED_POST: &str =
    "SELECT post_id FROM posts.posts WHERE post_id = $1 FOR KEY SHARE";

/// Columns of a post as the feeds show it. Counts are always derived from the relation
/// tables.
const POST_COLUMNS: &str = "
    SELECT
        posts.post_id,
        posts.content,
        posts.created_at,
        users.user_id,
        users.handle,
        (SELECT COUNT(*) FROM posts.likes WHERE likes.post_id = posts.post_id) AS likes_count,
        (SELECT COUNT(*) FROM posts.comments WHERE comments.post_id = posts.post_id)
            AS comments_count,
    ";

const POST_SOURCE: &str = "
    FROM
        posts.posts JOIN users.users ON users.user_id = posts.user_id
    ";

const AUTHOR_TOTAL_LIKES: &str = "
    SELECT
        COUNT(*)
    FROM
        posts.likes JOIN posts.posts ON posts.post_id = likes.post_id
    WHERE
        posts.user_id = $1
    ";

#[derive(Debug)]
pub struct DbClient {
    pool: PgPool,
}

fn push_post_select(builder: &mut QueryBuilder<'_, Postgres>, viewer: Option<Id<UserMarker>>) {
    builder.push(POST_COLUMNS);
    match viewer {
        Some(viewer) => {
            builder
                .push(
                    "EXISTS (
                        SELECT 1 FROM posts.likes
                        WHERE likes.post_id = posts.post_id AND likes.user_id = ",
                )
                .push_bind(viewer.get())
                .push(") AS liked");
        }
        None => {
            builder.push("NULL::BOOLEAN AS liked");
        }
    }
    builder.push(POST_SOURCE);
}

fn push_scope_filter(builder: &mut QueryBuilder<'_, Postgres>, scope: FeedScope) {
    match scope {
        FeedScope::Global => {}
        FeedScope::Author(author) => {
            builder
                .push(" WHERE posts.user_id = ")
                .push_bind(author.get());
        }
        FeedScope::FollowedBy(follower) => {
            builder
                .push(
                    " WHERE posts.user_id IN (
                        SELECT followee_id FROM users.follows WHERE follower_id = ",
                )
                .push_bind(follower.get())
                .push(")");
        }
    }
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// The stored password hash for a login attempt.
    pub async fn fetch_credentials(
        &self,
        handle: &UserHandle,
    ) -> Result<Option<(User, HashedPassword)>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT
                users.user_id,
                users.handle,
                users.password_hash
            FROM
                users.users
            WHERE
                users.handle = $1
            ",
        )
        .bind(handle.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(<(User, HashedPassword)>::try_from).transpose()?;
        Ok(credentials)
    }

    pub async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO users.auth_tokens (token_hash, user_id, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(authentication.token_hash.0.as_slice())
        .bind(authentication.user.get())
        .bind(authentication.created_at)
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                auth_tokens.user_id,
                auth_tokens.token_hash,
                auth_tokens.created_at,
                auth_tokens.expires_after_seconds
            FROM
                users.auth_tokens
            WHERE
                auth_tokens.token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    /// Returns whether a token was actually removed.
    pub async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let deleted = query("DELETE FROM users.auth_tokens WHERE token_hash = $1")
            .bind(token_hash.0.as_slice())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }
}

#[async_trait]
impl Store for DbClient {
    type Error = DbError;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle
            FROM
                users.users
            WHERE
                users.user_id = $1
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle
            FROM
                users.users
            WHERE
                users.handle = $1
            ",
        )
        .bind(handle.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn create_user(&self, user: &CreateUser) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (handle, email, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (handle) DO NOTHING
            RETURNING users.user_id, users.handle
            ",
        )
        .bind(user.handle.get())
        .bind(user.email.get())
        .bind(user.password_hash.as_phc_str())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn user_stats(&self, user_id: Id<UserMarker>) -> Result<UserStats> {
        let record = query_as::<_, UserStatsRecord>(
            "
            SELECT
                (SELECT COUNT(*) FROM users.follows WHERE followee_id = $1) AS followers_count,
                (SELECT COUNT(*) FROM users.follows WHERE follower_id = $1) AS following_count,
                (SELECT COUNT(*) FROM posts.posts WHERE user_id = $1) AS total_posts,
                (
                    SELECT COUNT(*)
                    FROM posts.likes JOIN posts.posts ON posts.post_id = likes.post_id
                    WHERE posts.user_id = $1
                ) AS total_likes
            ",
        )
        .bind(user_id.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    async fn is_following(
        &self,
        follower: Id<UserMarker>,
        followee: Id<UserMarker>,
    ) -> Result<bool> {
        let following = query_scalar::<_, bool>(
            "
            SELECT EXISTS (
                SELECT 1 FROM users.follows WHERE follower_id = $1 AND followee_id = $2
            )
            ",
        )
        .bind(follower.get())
        .bind(followee.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(following)
    }

    async fn toggle_follow(
        &self,
        follower: Id<UserMarker>,
        followee: Id<UserMarker>,
    ) -> Result<Option<FollowState>> {
        let mut transaction = self.pool.begin().await?;

        // Serializes toggles aimed at the same user.
        let followee_exists = query_scalar::<_, i64>(LOCK_FOLLOWEE)
            .bind(followee.get())
            .fetch_optional(&mut *transaction)
            .await?
            .is_some();
        if !followee_exists {
            return Ok(None);
        }

        let removed = query("DELETE FROM users.follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower.get())
            .bind(followee.get())
            .execute(&mut *transaction)
            .await?
            .rows_affected()
            > 0;
        if !removed {
            query("INSERT INTO users.follows (follower_id, followee_id) VALUES ($1, $2)")
                .bind(follower.get())
                .bind(followee.get())
                .execute(&mut *transaction)
                .await?;
        }

        let followers_count =
            query_scalar::<_, i64>("SELECT COUNT(*) FROM users.follows WHERE followee_id = $1")
                .bind(followee.get())
                .fetch_one(&mut *transaction)
                .await?;

        transaction.commit().await?;
        debug!(%follower, %followee, following = !removed, "Flipped follow edge");

        Ok(Some(FollowState {
            following: !removed,
            followers_count: followers_count.cast_unsigned(),
        }))
    }

    async fn toggle_like(
        &self,
        user: Id<UserMarker>,
        post: Id<PostMarker>,
    ) -> Result<Option<LikeState>> {
        let mut transaction = self.pool.begin().await?;

        // Serializes toggles on the same post and keeps a concurrent delete out.
        let Some(author) = query_scalar::<_, i64>(LOCK_LIKED_POST)
            .bind(post.get())
            .fetch_optional(&mut *transaction)
            .await?
        else {
            return Ok(None);
        };

        let removed = query("DELETE FROM posts.likes WHERE user_id = $1 AND post_id = $2")
            .bind(user.get())
            .bind(post.get())
            .execute(&mut *transaction)
            .await?
            .rows_affected()
            > 0;
        if !removed {
            query("INSERT INTO posts.likes (user_id, post_id) VALUES ($1, $2)")
                .bind(user.get())
                .bind(post.get())
                .execute(&mut *transaction)
                .await?;
        }

        let likes_count =
            query_scalar::<_, i64>("SELECT COUNT(*) FROM posts.likes WHERE post_id = $1")
                .bind(post.get())
                .fetch_one(&mut *transaction)
                .await?;
        let author_total_likes = query_scalar::<_, i64>(AUTHOR_TOTAL_LIKES)
            .bind(author)
            .fetch_one(&mut *transaction)
            .await?;

        transaction.commit().await?;
        debug!(%user, %post, liked = !removed, "Flipped like edge");

        Ok(Some(LikeState {
            liked: !removed,
            likes_count: likes_count.cast_unsigned(),
            author_total_likes: author_total_likes.cast_unsigned(),
            author_id: author.into(),
        }))
    }

    async fn fetch_feed(
        &self,
        scope: FeedScope,
        viewer: Option<Id<UserMarker>>,
        requested: PageNumber,
    ) -> Result<Page<Post>> {
        let mut transaction = self.pool.begin().await?;
        // The count and the page must see the same set of posts.
        query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *transaction)
            .await?;

        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM posts.posts");
        push_scope_filter(&mut builder, scope);
        let total = builder
            .build_query_scalar::<i64>()
            .fetch_one(&mut *transaction)
            .await?
            .cast_unsigned();

        let window = PageWindow::resolve(requested, total);

        let mut builder = QueryBuilder::new("");
        push_post_select(&mut builder, viewer);
        push_scope_filter(&mut builder, scope);
        builder
            .push(" ORDER BY posts.created_at DESC, posts.post_id DESC LIMIT ")
            .push_bind(window.limit.cast_signed())
            .push(" OFFSET ")
            .push_bind(window.offset.cast_signed());
        let records = builder
            .build_query_as::<PostRecord>()
            .fetch_all(&mut *transaction)
            .await?;

        transaction.commit().await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Page::new(window, total, posts))
    }

    async fn fetch_post(
        &self,
        post_id: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Option<Post>> {
        let mut builder = QueryBuilder::new("");
        push_post_select(&mut builder, viewer);
        builder
            .push(" WHERE posts.post_id = ")
            .push_bind(post_id.get());

        let record = builder
            .build_query_as::<PostRecord>()
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn fetch_post_author(&self, post_id: Id<PostMarker>) -> Result<Option<Id<UserMarker>>> {
        let author = query_scalar::<_, i64>("SELECT user_id FROM posts.posts WHERE post_id = $1")
            .bind(post_id.get())
            .fetch_optional(&self.pool)
            .await?;

        Ok(author.map(Id::new))
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let record = query_as::<_, PostRecord>(
            "
            WITH inserted AS (
                INSERT INTO posts.posts (user_id, content)
                VALUES ($1, $2)
                RETURNING post_id, user_id, content, created_at
            )
            SELECT
                inserted.post_id,
                inserted.content,
                inserted.created_at,
                users.user_id,
                users.handle,
                0::BIGINT AS likes_count,
                0::BIGINT AS comments_count,
                NULL::BOOLEAN AS liked
            FROM
                inserted JOIN users.users ON users.user_id = inserted.user_id
            ",
        )
        .bind(post.author.get())
        .bind(post.content.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(Post::try_from(record)?)
    }

    async fn update_post_content(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let updated = query("UPDATE posts.posts SET content = $2 WHERE post_id = $1")
            .bind(post_id.get())
            .bind(content.get())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Ok(None);
        }

        self.fetch_post(post_id, None).await
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<Option<PostDeletionSnapshot>> {
        let mut transaction = self.pool.begin().await?;

        let Some(author) =
            query_scalar::<_, i64>("SELECT user_id FROM posts.posts WHERE post_id = $1 FOR UPDATE")
                .bind(post_id.get())
                .fetch_optional(&mut *transaction)
                .await?
        else {
            return Ok(None);
        };

        let (author_total_posts, author_total_likes, post_likes) =
            query_as::<_, (i64, i64, i64)>(
                "
                SELECT
                    (SELECT COUNT(*) FROM posts.posts WHERE user_id = $1),
                    (
                        SELECT COUNT(*)
                        FROM posts.likes JOIN posts.posts ON posts.post_id = likes.post_id
                        WHERE posts.user_id = $1
                    ),
                    (SELECT COUNT(*) FROM posts.likes WHERE post_id = $2)
                ",
            )
            .bind(author)
            .bind(post_id.get())
            .fetch_one(&mut *transaction)
            .await?;

        let comments = query("DELETE FROM posts.comments WHERE post_id = $1")
            .bind(post_id.get())
            .execute(&mut *transaction)
            .await?
            .rows_affected();
        query("DELETE FROM posts.likes WHERE post_id = $1")
            .bind(post_id.get())
            .execute(&mut *transaction)
            .await?;
        query("DELETE FROM posts.posts WHERE post_id = $1")
            .bind(post_id.get())
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;
        debug!(post = %post_id, comments, likes = post_likes, "Cascaded post deletion");

        Ok(Some(PostDeletionSnapshot {
            author: author.into(),
            author_total_posts: author_total_posts.cast_unsigned(),
            author_total_likes: author_total_likes.cast_unsigned(),
            post_likes: post_likes.cast_unsigned(),
        }))
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Option<CommentCreated>> {
        let mut transaction = self.pool.begin().await?;

        // Holds off a concurrent delete until the comment is in.
        let post_exists = query_scalar::<_, i64>(LOCK_COMMENTED_POST)
            .bind(comment.post.get())
            .fetch_optional(&mut *transaction)
            .await?
            .is_some();
        if !post_exists {
            return Ok(None);
        }

        let record = query_as::<_, CommentRecord>(
            "
            WITH inserted AS (
                INSERT INTO posts.comments (post_id, user_id, content)
                VALUES ($1, $2, $3)
                RETURNING comment_id, post_id, user_id, content, created_at
            )
            SELECT
                inserted.comment_id,
                inserted.post_id,
                inserted.content,
                inserted.created_at,
                users.user_id,
                users.handle
            FROM
                inserted JOIN users.users ON users.user_id = inserted.user_id
            ",
        )
        .bind(comment.post.get())
        .bind(comment.author.get())
        .bind(comment.content.get())
        .fetch_one(&mut *transaction)
        .await?;

        let comments_count =
            query_scalar::<_, i64>("SELECT COUNT(*) FROM posts.comments WHERE post_id = $1")
                .bind(comment.post.get())
                .fetch_one(&mut *transaction)
                .await?;

        transaction.commit().await?;

        Ok(Some(CommentCreated {
            comment: Comment::try_from(record)?,
            comments_count: comments_count.cast_unsigned(),
        }))
    }

    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Option<Vec<Comment>>> {
        let mut transaction = self.pool.begin().await?;

        let post_exists =
            query_scalar::<_, i64>("SELECT post_id FROM posts.posts WHERE post_id = $1")
                .bind(post_id.get())
                .fetch_optional(&mut *transaction)
                .await?
                .is_some();
        if !post_exists {
            return Ok(None);
        }

        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.comment_id,
                comments.post_id,
                comments.content,
                comments.created_at,
                users.user_id,
                users.handle
            FROM
                posts.comments JOIN users.users ON users.user_id = comments.user_id
            WHERE
                comments.post_id = $1
            ORDER BY
                comments.created_at DESC, comments.comment_id DESC
            ",
        )
        .bind(post_id.get())
        .fetch_all(&mut *transaction)
        .await?;

        transaction.commit().await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Some(comments))
    }
}
