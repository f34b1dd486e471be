use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use posthorn_common::{
    model::{Id, relation::FollowState, user::UserMarker},
    service::relationship,
};
use posthorn_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(follow_user)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follow_user/{id}", rejection(ServerError))]
struct FollowUserPath {
    id: Id<UserMarker>,
}

async fn follow_user(
    FollowUserPath { id }: FollowUserPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<FollowState>> {
    let state = relationship::toggle_follow(&*db, Some(user.user_id()), id).await?;

    Ok(Json(state))
}
