use crate::server::{
    Result, ServerError, ServerRouter,
    auth::{AuthenticatedUser, issue_token},
    body::JsonOrForm,
    json::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use posthorn_common::{
    model::user::{User, UserHandle},
    service::account::{self, Registration},
    util::PositiveDuration,
};
use posthorn_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(login)
        .typed_post(logout)
}

/// A logged in user together with their fresh bearer token.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct Session {
    user: User,
    token: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/register", rejection(ServerError))]
struct RegisterPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct RegisterBody {
    username: String,
    email: String,
    password: String,
    confirmation: String,
}

async fn register(
    RegisterPath(): RegisterPath,
    State(db): State<Arc<DbClient>>,
    State(token_lifetime): State<Option<PositiveDuration>>,
    JsonOrForm(body): JsonOrForm<RegisterBody>,
) -> Result<Json<Session>> {
    let registration = Registration {
        username: body.username,
        email: body.email,
        password: body.password,
        confirmation: body.confirmation,
    };
    let user = account::register(&*db, registration).await?;
    let token = issue_token(&db, user.id, token_lifetime).await?;

    Ok(Json(Session { user, token }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/login", rejection(ServerError))]
struct LoginPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn login(
    LoginPath(): LoginPath,
    State(db): State<Arc<DbClient>>,
    State(token_lifetime): State<Option<PositiveDuration>>,
    JsonOrForm(body): JsonOrForm<LoginBody>,
) -> Result<Json<Session>> {
    let handle = UserHandle::new(body.username).map_err(|_| ServerError::InvalidCredentials)?;

    let Some((user, password_hash)) = db.fetch_credentials(&handle).await? else {
        debug!(handle = handle.get(), "Login for unknown user");
        return Err(ServerError::InvalidCredentials);
    };
    if !password_hash.verify(&body.password)? {
        debug!(user = %user.id, "Login with wrong password");
        return Err(ServerError::InvalidCredentials);
    }

    let token = issue_token(&db, user.id, token_lifetime).await?;
    info!(user = %user.id, "User logged in");

    Ok(Json(Session { user, token }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.delete_auth(user.token_hash()).await?;
    info!(user = %user.user_id(), "User logged out");

    Ok(StatusCode::NO_CONTENT)
}
