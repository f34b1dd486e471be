use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, found, json::Json,
};
use axum::{
    extract::{Query, State, rejection::QueryRejection},
    response::{IntoResponse, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use posthorn_common::{
    feed::{Page, PageNumber},
    model::{
        Id,
        comment::Comment,
        post::{Post, PostMarker},
        user::UserHandle,
    },
    service::feed::{self, ProfileFeed},
};
use posthorn_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(index)
        .typed_get(profile)
        .typed_get(following)
        .typed_get(get_post)
        .typed_get(get_comments)
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct PageQuery {
    page: Option<String>,
}

/// A query string that cannot even be decoded is treated like a missing page number.
fn requested_page(query: Result<Query<PageQuery>, QueryRejection>) -> PageNumber {
    query.map_or(PageNumber::FIRST, |Query(query)| {
        PageNumber::parse(query.page.as_deref())
    })
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
struct IndexPath();

async fn index(
    IndexPath(): IndexPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<Post>>> {
    let viewer = viewer.as_ref().map(AuthenticatedUser::user_id);
    let page = feed::global_feed(&*db, viewer, requested_page(query)).await?;

    Ok(Json(page))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}", rejection(ServerError))]
struct ProfilePath {
    username: UserHandle,
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<ProfileFeed>> {
    let viewer = viewer.as_ref().map(AuthenticatedUser::user_id);
    let profile = feed::profile_feed(&*db, viewer, &username, requested_page(query)).await?;

    Ok(Json(profile))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/following", rejection(ServerError))]
struct FollowingPath();

async fn following(
    FollowingPath(): FollowingPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Response> {
    let Some(viewer) = viewer else {
        return Ok(found("/login"));
    };

    let page =
        feed::following_feed(&*db, Some(viewer.user_id()), requested_page(query)).await?;

    Ok(Json(page).into_response())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct GetPostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    GetPostPath { id }: GetPostPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
) -> Result<Json<Post>> {
    let viewer = viewer.as_ref().map(AuthenticatedUser::user_id);
    let post = feed::post(&*db, viewer, id).await?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct GetCommentsPath {
    id: Id<PostMarker>,
}

async fn get_comments(
    GetCommentsPath { id }: GetCommentsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Comment>>> {
    let comments = feed::comments(&*db, id).await?;

    Ok(Json(comments))
}
