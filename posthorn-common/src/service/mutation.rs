use crate::{
    model::{
        Id, ModelValidationError,
        comment::{CommentContent, CommentCreated, CreateComment},
        post::{AuthorTotals, CreatePost, Post, PostContent, PostMarker},
        user::UserMarker,
    },
    service::{PostAction, Result, ServiceError, require_actor},
    store::Store,
};
use tracing::{debug, info};

pub async fn create_post<S: Store + ?Sized>(
    store: &S,
    actor: Option<Id<UserMarker>>,
    content: String,
) -> Result<Post, S::Error> {
    let author = require_actor(actor)?;

    let post = store
        .create_post(&CreatePost { author, content })
        .await
        .map_err(ServiceError::Store)?;

    info!(post = %post.id, %author, "Created post");
    Ok(post)
}

/// Looks up the post's author and rejects anyone else.
async fn ensure_author<S: Store + ?Sized>(
    store: &S,
    actor: Id<UserMarker>,
    post_id: Id<PostMarker>,
    action: PostAction,
) -> Result<(), S::Error> {
    let Some(author) = store
        .fetch_post_author(post_id)
        .await
        .map_err(ServiceError::Store)?
    else {
        return Err(ServiceError::PostNotFound(post_id));
    };

    if author == actor {
        Ok(())
    } else {
        Err(ServiceError::NotPostAuthor(action))
    }
}

/// Replaces the content of the actor's own post. The creation timestamp is kept.
pub async fn edit_post<S: Store + ?Sized>(
    store: &S,
    actor: Option<Id<UserMarker>>,
    post_id: Id<PostMarker>,
    content: String,
) -> Result<Post, S::Error> {
    let actor = require_actor(actor)?;
    ensure_author(store, actor, post_id, PostAction::Edit).await?;
    let content = PostContent::new(content).map_err(ModelValidationError::from)?;

    let Some(post) = store
        .update_post_content(post_id, &content)
        .await
        .map_err(ServiceError::Store)?
    else {
        return Err(ServiceError::PostNotFound(post_id));
    };

    debug!(post = %post_id, %actor, "Edited post");
    Ok(post)
}

/// Deletes the actor's own post along with its comments and likes, returning the
/// author's totals as they stand after the deletion.
pub async fn delete_post<S: Store + ?Sized>(
    store: &S,
    actor: Option<Id<UserMarker>>,
    post_id: Id<PostMarker>,
) -> Result<AuthorTotals, S::Error> {
    let actor = require_actor(actor)?;
    ensure_author(store, actor, post_id, PostAction::Delete).await?;

    let Some(snapshot) = store
        .delete_post(post_id)
        .await
        .map_err(ServiceError::Store)?
    else {
        return Err(ServiceError::PostNotFound(post_id));
    };

    info!(post = %post_id, %actor, likes = snapshot.post_likes, "Deleted post");
    Ok(snapshot.remaining_totals())
}

pub async fn create_comment<S: Store + ?Sized>(
    store: &S,
    actor: Option<Id<UserMarker>>,
    post_id: Id<PostMarker>,
    content: &str,
) -> Result<CommentCreated, S::Error> {
    let author = require_actor(actor)?;
    if store
        .fetch_post_author(post_id)
        .await
        .map_err(ServiceError::Store)?
        .is_none()
    {
        return Err(ServiceError::PostNotFound(post_id));
    }
    let content = CommentContent::new(content).map_err(ModelValidationError::from)?;

    let comment = CreateComment {
        post: post_id,
        author,
        content,
    };
    let Some(created) = store
        .create_comment(&comment)
        .await
        .map_err(ServiceError::Store)?
    else {
        return Err(ServiceError::PostNotFound(post_id));
    };

    debug!(post = %post_id, comment = %created.comment.id, %author, "Created comment");
    Ok(created)
}
