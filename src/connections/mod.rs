mod handlers;
mod service;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub use service::Connections;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/followers", get(handlers::followers))
        .route("/following", get(handlers::following))
        .route("/{user}", post(handlers::follow).delete(handlers::unfollow))
}
