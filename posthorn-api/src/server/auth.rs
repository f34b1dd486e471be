use crate::server::{Result, ServerError};
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use posthorn_common::{
    model::{
        Id,
        auth::{AuthToken, AuthTokenHash, Authentication},
        user::UserMarker,
    },
    util::PositiveDuration,
};
use posthorn_db::client::DbClient;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The caller behind a valid bearer token.
///
/// Extracting it directly rejects anonymous requests. `Option<AuthenticatedUser>` yields
/// `None` when no `Authorization` header is present but still rejects a bad token.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
    token_hash: AuthTokenHash,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.id
    }

    #[must_use]
    pub fn token_hash(&self) -> &AuthTokenHash {
        &self.token_hash
    }

    async fn from_token(token: &str, db: &DbClient) -> Result<Self> {
        let request_token: AuthToken = token.parse()?;
        let token_hash = request_token.hash()?;

        let authentication = db
            .fetch_auth(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        if authentication.user != request_token.user_id
            || authentication.is_expired_at(OffsetDateTime::now_utc())
        {
            return Err(ServerError::InvalidToken);
        }

        Ok(Self {
            id: authentication.user,
            token_hash,
        })
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?;

        Self::from_token(header.token(), &Arc::<DbClient>::from_ref(state)).await
    }
}

impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let header =
            <Option<AuthorizationHeader> as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?;

        match header {
            Some(header) => Self::from_token(header.token(), &Arc::<DbClient>::from_ref(state))
                .await
                .map(Some),
            None => Ok(None),
        }
    }
}

/// Creates and stores a fresh token for `user`. The returned string is the only copy of
/// the token in plain form.
pub async fn issue_token(
    db: &DbClient,
    user: Id<UserMarker>,
    lifetime: Option<PositiveDuration>,
) -> Result<String> {
    let token = AuthToken::generate_random(user);

    let authentication = Authentication {
        user,
        token_hash: token.hash()?,
        created_at: OffsetDateTime::now_utc(),
        expires_after: lifetime,
    };
    db.create_auth(&authentication).await?;

    debug!(%user, "Issued auth token");
    Ok(token.as_token_str())
}
