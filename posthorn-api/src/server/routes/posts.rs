use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, body::JsonOrForm, found,
    json::Json,
};
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use posthorn_common::{
    model::{
        Id,
        comment::CommentMarker,
        post::PostMarker,
        user::{UserHandle, UserMarker},
    },
    service::{mutation, relationship},
};
use posthorn_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_post)
        .typed_post(edit_post)
        .typed_post(delete_post)
        .typed_post(like_post)
        .typed_post(comment_post)
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct ContentBody {
    #[serde(default)]
    content: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/create_post", rejection(ServerError))]
struct CreatePostPath();

/// Anonymous callers are sent back to the index without anything being written.
async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(db): State<Arc<DbClient>>,
    author: Option<AuthenticatedUser>,
    body: Result<JsonOrForm<ContentBody>>,
) -> Result<Response> {
    let Some(author) = author else {
        return Ok(found("/"));
    };
    let JsonOrForm(body) = body?;

    let post = mutation::create_post(&*db, Some(author.user_id()), body.content).await?;

    Ok(Json(post).into_response())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/edit_post/{id}", rejection(ServerError))]
struct EditPostPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct EditPostResponse {
    message: &'static str,
    content: String,
}

async fn edit_post(
    EditPostPath { id }: EditPostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    JsonOrForm(body): JsonOrForm<ContentBody>,
) -> Result<Json<EditPostResponse>> {
    let post = mutation::edit_post(&*db, Some(user.user_id()), id, body.content).await?;

    Ok(Json(EditPostResponse {
        message: "Post updated successfully",
        content: post.content,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/delete_post/{id}", rejection(ServerError))]
struct DeletePostPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct DeletePostResponse {
    message: &'static str,
    total_posts: u64,
    total_likes: u64,
}

async fn delete_post(
    DeletePostPath { id }: DeletePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<DeletePostResponse>> {
    let totals = mutation::delete_post(&*db, Some(user.user_id()), id).await?;

    Ok(Json(DeletePostResponse {
        message: "Post deleted successfully",
        total_posts: totals.total_posts,
        total_likes: totals.total_likes,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/like_post/{id}", rejection(ServerError))]
struct LikePostPath {
    id: Id<PostMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct LikePostResponse {
    liked: bool,
    likes_count: u64,
    post_author_total_likes: u64,
    post_author_id: Id<UserMarker>,
}

async fn like_post(
    LikePostPath { id }: LikePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<LikePostResponse>> {
    let state = relationship::toggle_like(&*db, Some(user.user_id()), id).await?;

    Ok(Json(LikePostResponse {
        liked: state.liked,
        likes_count: state.likes_count,
        post_author_total_likes: state.author_total_likes,
        post_author_id: state.author_id,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/comment_post/{id}", rejection(ServerError))]
struct CommentPostPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct CommentPostResponse {
    message: &'static str,
    comment_id: Id<CommentMarker>,
    comment_content: String,
    comment_user: UserHandle,
    #[serde(with = "time::serde::rfc3339")]
    comment_timestamp: OffsetDateTime,
    comments_count: u64,
}

async fn comment_post(
    CommentPostPath { id }: CommentPostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    JsonOrForm(body): JsonOrForm<ContentBody>,
) -> Result<Json<CommentPostResponse>> {
    let created = mutation::create_comment(&*db, Some(user.user_id()), id, &body.content).await?;
    let comment = created.comment;

    Ok(Json(CommentPostResponse {
        message: "Comment added successfully",
        comment_id: comment.id,
        comment_content: comment.content,
        comment_user: comment.author.handle,
        comment_timestamp: comment.created_at,
        comments_count: created.comments_count,
    }))
}
