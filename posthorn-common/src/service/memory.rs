//! An in-memory [`Store`] for exercising the services without a database.

use crate::{
    feed::{FeedScope, Page, PageNumber, PageWindow},
    model::{
        Id,
        auth::HashedPassword,
        comment::{Comment, CommentContent, CommentCreated, CommentMarker, CreateComment},
        post::{CreatePost, Post, PostContent, PostDeletionSnapshot, PostMarker},
        relation::{FollowState, LikeState},
        user::{CreateUser, Email, User, UserHandle, UserMarker, UserStats},
    },
    store::Store,
};
use async_trait::async_trait;
use std::{collections::BTreeSet, convert::Infallible, sync::Mutex};
use time::{Duration, OffsetDateTime, macros::datetime};

struct PostRow {
    id: Id<PostMarker>,
    author: Id<UserMarker>,
    content: String,
    created_at: OffsetDateTime,
}

struct CommentRow {
    id: Id<CommentMarker>,
    post: Id<PostMarker>,
    author: Id<UserMarker>,
    content: String,
    created_at: OffsetDateTime,
}

struct State {
    last_id: i64,
    now: OffsetDateTime,
    tick: Duration,
    users: Vec<User>,
    posts: Vec<PostRow>,
    comments: Vec<CommentRow>,
    /// (follower, followee)
    follows: BTreeSet<(Id<UserMarker>, Id<UserMarker>)>,
    /// (user, post)
    likes: BTreeSet<(Id<UserMarker>, Id<PostMarker>)>,
}

pub(crate) struct MemoryStore {
    state: Mutex<State>,
}

impl State {
    fn next_id<Marker>(&mut self) -> Id<Marker> {
        self.last_id += 1;
        Id::new(self.last_id)
    }

    fn timestamp(&mut self) -> OffsetDateTime {
        self.now += self.tick;
        self.now
    }

    fn user(&self, user_id: Id<UserMarker>) -> Option<&User> {
        self.users.iter().find(|user| user.id == user_id)
    }

    fn post_row(&self, post_id: Id<PostMarker>) -> Option<&PostRow> {
        self.posts.iter().find(|post| post.id == post_id)
    }

    fn likes_of(&self, post_id: Id<PostMarker>) -> u64 {
        self.likes.iter().filter(|(_, post)| *post == post_id).count() as u64
    }

    fn likes_received(&self, author: Id<UserMarker>) -> u64 {
        self.posts
            .iter()
            .filter(|post| post.author == author)
            .map(|post| self.likes_of(post.id))
            .sum()
    }

    fn in_scope(&self, post: &PostRow, scope: FeedScope) -> bool {
        match scope {
            FeedScope::Global => true,
            FeedScope::Author(author) => post.author == author,
            FeedScope::FollowedBy(follower) => self.follows.contains(&(follower, post.author)),
        }
    }

    fn to_post(&self, row: &PostRow, viewer: Option<Id<UserMarker>>) -> Post {
        Post {
            id: row.id,
            author: self.user(row.author).cloned().unwrap(),
            content: row.content.clone(),
            created_at: row.created_at,
            likes_count: self.likes_of(row.id),
            comments_count: self
                .comments
                .iter()
                .filter(|comment| comment.post == row.id)
                .count() as u64,
            liked: viewer.map(|viewer| self.likes.contains(&(viewer, row.id))),
        }
    }

    fn to_comment(&self, row: &CommentRow) -> Comment {
        Comment {
            id: row.id,
            post: row.post,
            author: self.user(row.author).cloned().unwrap(),
            content: row.content.clone(),
            created_at: row.created_at,
        }
    }
}

impl MemoryStore {
    fn with_tick(tick: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                last_id: 0,
                now: datetime!(2025-01-01 00:00 UTC),
                tick,
                users: Vec::new(),
                posts: Vec::new(),
                comments: Vec::new(),
                follows: BTreeSet::new(),
                likes: BTreeSet::new(),
            }),
        }
    }

    /// Every new row is stamped one second after the previous one.
    pub(crate) fn new() -> Self {
        Self::with_tick(Duration::seconds(1))
    }

    /// Every new row gets the same timestamp.
    pub(crate) fn frozen_clock() -> Self {
        Self::with_tick(Duration::ZERO)
    }

    pub(crate) async fn user(&self, handle: &str) -> User {
        let user = CreateUser {
            handle: UserHandle::new(handle.to_owned()).unwrap(),
            email: Email::new(format!("{handle}@example.com")).unwrap(),
            password_hash: HashedPassword::from_phc_string(String::new()),
        };
        self.create_user(&user).await.unwrap().unwrap()
    }

    pub(crate) async fn post(&self, author: Id<UserMarker>, content: &str) -> Post {
        let post = CreatePost {
            author,
            content: content.to_owned(),
        };
        self.create_post(&post).await.unwrap()
    }

    pub(crate) async fn comment(
        &self,
        author: Id<UserMarker>,
        post: Id<PostMarker>,
        content: &str,
    ) -> Comment {
        let comment = CreateComment {
            post,
            author,
            content: CommentContent::new(content).unwrap(),
        };
        self.create_comment(&comment).await.unwrap().unwrap().comment
    }

    /// Moves the clock back so the next row is stamped before earlier ones.
    pub(crate) fn rewind_clock(&self, by: Duration) {
        self.state.lock().unwrap().now -= by;
    }

    pub(crate) fn post_count(&self) -> usize {
        self.state.lock().unwrap().posts.len()
    }

    pub(crate) fn comment_count(&self) -> usize {
        self.state.lock().unwrap().comments.len()
    }

    pub(crate) fn like_count(&self) -> usize {
        self.state.lock().unwrap().likes.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Error = Infallible;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>, Infallible> {
        Ok(self.state.lock().unwrap().user(user_id).cloned())
    }

    async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>, Infallible> {
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|user| user.handle == *handle).cloned())
    }

    async fn create_user(&self, user: &CreateUser) -> Result<Option<User>, Infallible> {
        let mut state = self.state.lock().unwrap();
        if state.users.iter().any(|existing| existing.handle == user.handle) {
            return Ok(None);
        }

        let created = User {
            id: state.next_id(),
            handle: user.handle.clone(),
        };
        state.users.push(created.clone());
        Ok(Some(created))
    }

    async fn user_stats(&self, user_id: Id<UserMarker>) -> Result<UserStats, Infallible> {
        let state = self.state.lock().unwrap();
        Ok(UserStats {
            followers_count: state.follows.iter().filter(|(_, to)| *to == user_id).count() as u64,
            following_count: state.follows.iter().filter(|(from, _)| *from == user_id).count()
                as u64,
            total_posts: state.posts.iter().filter(|post| post.author == user_id).count() as u64,
            total_likes: state.likes_received(user_id),
        })
    }

    async fn is_following(
        &self,
        follower: Id<UserMarker>,
        followee: Id<UserMarker>,
    ) -> Result<bool, Infallible> {
        Ok(self.state.lock().unwrap().follows.contains(&(follower, followee)))
    }

    async fn toggle_follow(
        &self,
        follower: Id<UserMarker>,
        followee: Id<UserMarker>,
    ) -> Result<Option<FollowState>, Infallible> {
        let mut state = self.state.lock().unwrap();
        if state.user(followee).is_none() {
            return Ok(None);
        }

        let edge = (follower, followee);
        let following = !state.follows.remove(&edge) && state.follows.insert(edge);
        let followers_count = state.follows.iter().filter(|(_, to)| *to == followee).count();

        Ok(Some(FollowState {
            following,
            followers_count: followers_count as u64,
        }))
    }

    async fn toggle_like(
        &self,
        user: Id<UserMarker>,
        post: Id<PostMarker>,
    ) -> Result<Option<LikeState>, Infallible> {
        let mut state = self.state.lock().unwrap();
        let Some(author_id) = state.post_row(post).map(|row| row.author) else {
            return Ok(None);
        };

        let edge = (user, post);
        let liked = !state.likes.remove(&edge) && state.likes.insert(edge);

        Ok(Some(LikeState {
            liked,
            likes_count: state.likes_of(post),
            author_total_likes: state.likes_received(author_id),
            author_id,
        }))
    }

    async fn fetch_feed(
        &self,
        scope: FeedScope,
        viewer: Option<Id<UserMarker>>,
        requested: PageNumber,
    ) -> Result<Page<Post>, Infallible> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<_> = state
            .posts
            .iter()
            .filter(|post| state.in_scope(post, scope))
            .collect();
        rows.sort_by_key(|post| std::cmp::Reverse((post.created_at, post.id)));

        let total = rows.len() as u64;
        let window = PageWindow::resolve(requested, total);
        let items = rows
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .map(|row| state.to_post(row, viewer))
            .collect();

        Ok(Page::new(window, total, items))
    }

    async fn fetch_post(
        &self,
        post_id: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Option<Post>, Infallible> {
        let state = self.state.lock().unwrap();
        Ok(state.post_row(post_id).map(|row| state.to_post(row, viewer)))
    }

    async fn fetch_post_author(
        &self,
        post_id: Id<PostMarker>,
    ) -> Result<Option<Id<UserMarker>>, Infallible> {
        Ok(self.state.lock().unwrap().post_row(post_id).map(|row| row.author))
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post, Infallible> {
        let mut state = self.state.lock().unwrap();
        let row = PostRow {
            id: state.next_id(),
            author: post.author,
            content: post.content.clone(),
            created_at: state.timestamp(),
        };
        let created = state.to_post(&row, None);
        state.posts.push(row);
        Ok(created)
    }

    async fn update_post_content(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>, Infallible> {
        let mut state = self.state.lock().unwrap();
        let Some(row) = state.posts.iter_mut().find(|post| post.id == post_id) else {
            return Ok(None);
        };
        content.get().clone_into(&mut row.content);

        Ok(state.post_row(post_id).map(|row| state.to_post(row, None)))
    }

    async fn delete_post(
        &self,
        post_id: Id<PostMarker>,
    ) -> Result<Option<PostDeletionSnapshot>, Infallible> {
        let mut state = self.state.lock().unwrap();
        let Some(author) = state.post_row(post_id).map(|row| row.author) else {
            return Ok(None);
        };

        let snapshot = PostDeletionSnapshot {
            author,
            author_total_posts: state.posts.iter().filter(|post| post.author == author).count()
                as u64,
            author_total_likes: state.likes_received(author),
            post_likes: state.likes_of(post_id),
        };

        state.comments.retain(|comment| comment.post != post_id);
        state.likes.retain(|(_, post)| *post != post_id);
        state.posts.retain(|post| post.id != post_id);

        Ok(Some(snapshot))
    }

    async fn create_comment(
        &self,
        comment: &CreateComment,
    ) -> Result<Option<CommentCreated>, Infallible> {
        let mut state = self.state.lock().unwrap();
        if state.post_row(comment.post).is_none() {
            return Ok(None);
        }

        let row = CommentRow {
            id: state.next_id(),
            post: comment.post,
            author: comment.author,
            content: comment.content.get().to_owned(),
            created_at: state.timestamp(),
        };
        let created = state.to_comment(&row);
        state.comments.push(row);
        let comments_count = state
            .comments
            .iter()
            .filter(|existing| existing.post == comment.post)
            .count() as u64;

        Ok(Some(CommentCreated {
            comment: created,
            comments_count,
        }))
    }

    async fn fetch_comments(
        &self,
        post_id: Id<PostMarker>,
    ) -> Result<Option<Vec<Comment>>, Infallible> {
        let state = self.state.lock().unwrap();
        if state.post_row(post_id).is_none() {
            return Ok(None);
        }

        let mut rows: Vec<_> = state
            .comments
            .iter()
            .filter(|comment| comment.post == post_id)
            .collect();
        rows.sort_by_key(|comment| std::cmp::Reverse((comment.created_at, comment.id)));

        Ok(Some(rows.into_iter().map(|row| state.to_comment(row)).collect()))
    }
}
