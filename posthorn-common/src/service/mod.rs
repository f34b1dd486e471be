//! The request→result operations of the network. Each takes the acting user as an
//! `Option`, with `None` meaning the caller is anonymous.

pub mod account;
pub mod feed;
pub mod mutation;
pub mod relationship;

#[cfg(test)]
mod memory;

use crate::model::{
    Id, ModelValidationError,
    auth::PasswordHashError,
    post::PostMarker,
    user::{UserHandle, UserMarker},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type Result<T, E> = std::result::Result<T, ServiceError<E>>;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostAction {
    Edit,
    Delete,
}

impl Display for PostAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PostAction::Edit => f.write_str("edit"),
            PostAction::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ValidationError {
    #[error("You cannot follow yourself")]
    SelfFollow,
    #[error("Passwords must match.")]
    PasswordMismatch,
    #[error(transparent)]
    Model(#[from] ModelValidationError),
}

#[derive(Debug, Error)]
pub enum ServiceError<E> {
    #[error("Authentication required")]
    AuthenticationRequired,
    #[error("You can only {0} your own posts")]
    NotPostAuthor(PostAction),
    #[error("User with id {0} was not found")]
    UserNotFound(Id<UserMarker>),
    #[error("User {} was not found", .0.get())]
    UserByHandleNotFound(UserHandle),
    #[error("Post with id {0} was not found")]
    PostNotFound(Id<PostMarker>),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Username already taken.")]
    HandleTaken(UserHandle),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    Store(E),
}

impl<E> From<ModelValidationError> for ServiceError<E> {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value.into())
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Error)]
#[error("Authentication required")]
pub struct AuthenticationRequired;

impl<E> From<AuthenticationRequired> for ServiceError<E> {
    fn from(_: AuthenticationRequired) -> Self {
        Self::AuthenticationRequired
    }
}

fn require_actor(
    actor: Option<Id<UserMarker>>,
) -> std::result::Result<Id<UserMarker>, AuthenticationRequired> {
    actor.ok_or(AuthenticationRequired)
}
