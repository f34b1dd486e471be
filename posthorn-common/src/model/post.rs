use crate::model::{
    Id,
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// A post as it appears in feeds, with its derived counts.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: User,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub likes_count: u64,
    pub comments_count: u64,
    /// Whether the viewer likes this post, if there is a viewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    /// May be empty.
    pub content: String,
}

/// Replacement content for an existing post. Must contain something other than whitespace,
/// but is stored exactly as given.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct PostContent(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Content cannot be empty")]
pub struct BlankPostContentError;

impl PostContent {
    pub fn new(content: String) -> Result<Self, BlankPostContentError> {
        if content.trim().is_empty() {
            Err(BlankPostContentError)
        } else {
            Ok(Self(content))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Counts taken inside the deleting transaction, before the post row goes away.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostDeletionSnapshot {
    pub author: Id<UserMarker>,
    pub author_total_posts: u64,
    pub author_total_likes: u64,
    pub post_likes: u64,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct AuthorTotals {
    pub total_posts: u64,
    pub total_likes: u64,
}

impl PostDeletionSnapshot {
    /// The author's totals once the deleted post no longer counts.
    #[must_use]
    pub fn remaining_totals(self) -> AuthorTotals {
        AuthorTotals {
            total_posts: self.author_total_posts.saturating_sub(1),
            total_likes: self.author_total_likes.saturating_sub(self.post_likes),
        }
    }
}
