use posthorn_common::{
    model::{
        ModelValidationError,
        auth::{Authentication, HashedPassword},
        comment::Comment,
        post::Post,
        user::{User, UserHandle, UserStats},
    },
    util::PositiveDuration,
};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub handle: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    pub user_id: i64,
    pub handle: String,
    pub password_hash: String,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserStatsRecord {
    pub followers_count: i64,
    pub following_count: i64,
    pub total_posts: i64,
    pub total_likes: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_id: i64,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub user_id: i64,
    pub handle: String,
    pub likes_count: i64,
    pub comments_count: i64,
    pub liked: Option<bool>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_id: i64,
    pub post_id: i64,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub user_id: i64,
    pub handle: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            handle: UserHandle::new(value.handle)?,
        })
    }
}

impl TryFrom<CredentialsRecord> for (User, HashedPassword) {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        let user = User {
            id: value.user_id.into(),
            handle: UserHandle::new(value.handle)?,
        };
        Ok((user, HashedPassword::from_phc_string(value.password_hash)))
    }
}

impl From<UserStatsRecord> for UserStats {
    fn from(value: UserStatsRecord) -> Self {
        Self {
            followers_count: value.followers_count.cast_unsigned(),
            following_count: value.following_count.cast_unsigned(),
            total_posts: value.total_posts.cast_unsigned(),
            total_likes: value.total_likes.cast_unsigned(),
        }
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.post_id.into(),
            author: User {
                id: value.user_id.into(),
                handle: UserHandle::new(value.handle)?,
            },
            content: value.content,
            created_at: value.created_at,
            likes_count: value.likes_count.cast_unsigned(),
            comments_count: value.comments_count.cast_unsigned(),
            liked: value.liked,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.comment_id.into(),
            post: value.post_id.into(),
            author: User {
                id: value.user_id.into(),
                handle: UserHandle::new(value.handle)?,
            },
            content: value.content,
            created_at: value.created_at,
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_id.into(),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at,
            expires_after: value
                .expires_after_seconds
                .map(PositiveDuration::from_seconds)
                .transpose()?,
        })
    }
}
