use crate::{
    model::{
        Id,
        post::PostMarker,
        relation::{FollowState, LikeState},
        user::UserMarker,
    },
    service::{Result, ServiceError, ValidationError, require_actor},
    store::Store,
};
use tracing::debug;

/// Follows `target` if the actor does not follow them yet, unfollows otherwise.
pub async fn toggle_follow<S: Store + ?Sized>(
    store: &S,
    actor: Option<Id<UserMarker>>,
    target: Id<UserMarker>,
) -> Result<FollowState, S::Error> {
    let actor = require_actor(actor)?;
    if actor == target {
        return Err(ValidationError::SelfFollow.into());
    }

    let Some(state) = store
        .toggle_follow(actor, target)
        .await
        .map_err(ServiceError::Store)?
    else {
        return Err(ServiceError::UserNotFound(target));
    };

    debug!(%actor, %target, following = state.following, "Toggled follow");
    Ok(state)
}

/// Likes `post` if the actor has not liked it yet, unlikes it otherwise.
pub async fn toggle_like<S: Store + ?Sized>(
    store: &S,
    actor: Option<Id<UserMarker>>,
    post: Id<PostMarker>,
) -> Result<LikeState, S::Error> {
    let actor = require_actor(actor)?;

    let Some(state) = store
        .toggle_like(actor, post)
        .await
        .map_err(ServiceError::Store)?
    else {
        return Err(ServiceError::PostNotFound(post));
    };

    debug!(%actor, %post, liked = state.liked, "Toggled like");
    Ok(state)
}
