//! The persistence boundary the services are written against.
//!
//! Every method is a single atomic unit. Toggles and the post cascade in particular must
//! run inside one transaction so that concurrent requests never observe half a change or
//! produce duplicate relation edges.

use crate::{
    feed::{FeedScope, Page, PageNumber},
    model::{
        Id,
        comment::{Comment, CommentCreated, CreateComment},
        post::{CreatePost, Post, PostContent, PostDeletionSnapshot, PostMarker},
        relation::{FollowState, LikeState},
        user::{CreateUser, User, UserHandle, UserMarker, UserStats},
    },
};
use async_trait::async_trait;

#[async_trait]
pub trait Store: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>, Self::Error>;

    async fn fetch_user_by_handle(&self, handle: &UserHandle)
    -> Result<Option<User>, Self::Error>;

    /// Returns `None` if the handle is already taken.
    async fn create_user(&self, user: &CreateUser) -> Result<Option<User>, Self::Error>;

    async fn user_stats(&self, user_id: Id<UserMarker>) -> Result<UserStats, Self::Error>;

    async fn is_following(
        &self,
        follower: Id<UserMarker>,
        followee: Id<UserMarker>,
    ) -> Result<bool, Self::Error>;

    /// Removes the edge if present, adds it otherwise. Returns `None` if the followee does
    /// not exist.
    async fn toggle_follow(
        &self,
        follower: Id<UserMarker>,
        followee: Id<UserMarker>,
    ) -> Result<Option<FollowState>, Self::Error>;

    /// Removes the like if present, adds it otherwise. Returns `None` if the post does not
    /// exist.
    async fn toggle_like(
        &self,
        user: Id<UserMarker>,
        post: Id<PostMarker>,
    ) -> Result<Option<LikeState>, Self::Error>;

    /// One page of posts in `scope`, newest first, with the requested page clamped into
    /// range. The total and the items are read from the same snapshot.
    async fn fetch_feed(
        &self,
        scope: FeedScope,
        viewer: Option<Id<UserMarker>>,
        requested: PageNumber,
    ) -> Result<Page<Post>, Self::Error>;

    async fn fetch_post(
        &self,
        post_id: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Option<Post>, Self::Error>;

    async fn fetch_post_author(
        &self,
        post_id: Id<PostMarker>,
    ) -> Result<Option<Id<UserMarker>>, Self::Error>;

    async fn create_post(&self, post: &CreatePost) -> Result<Post, Self::Error>;

    /// Replaces the content and nothing else. Returns `None` if the post does not exist.
    async fn update_post_content(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>, Self::Error>;

    /// Deletes the post with its comments and likes. The snapshot is taken in the same
    /// transaction, before anything is removed. Returns `None` if the post does not exist.
    async fn delete_post(
        &self,
        post_id: Id<PostMarker>,
    ) -> Result<Option<PostDeletionSnapshot>, Self::Error>;

    /// Returns `None` if the post does not exist.
    async fn create_comment(
        &self,
        comment: &CreateComment,
    ) -> Result<Option<CommentCreated>, Self::Error>;

    /// Comments newest first. Returns `None` if the post does not exist.
    async fn fetch_comments(
        &self,
        post_id: Id<PostMarker>,
    ) -> Result<Option<Vec<Comment>>, Self::Error>;
}
