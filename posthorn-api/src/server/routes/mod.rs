use crate::server::ServerRouter;
use axum::Router;

mod feed;
mod identity;
mod posts;
mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(feed::routes())
        .merge(posts::routes())
        .merge(users::routes())
        .merge(identity::routes())
}
