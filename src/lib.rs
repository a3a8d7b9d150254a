pub mod access;
pub mod activity;
pub mod clock;
pub mod config;
pub mod connections;
pub mod directory;
pub mod error;
pub mod feed;
pub mod mentorship;
pub mod messaging;
pub mod model;
pub mod notifications;
pub mod session;
pub mod store;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::FromRef,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};

use activity::Activity;
use clock::{Clock, SystemClock};
use config::Config;
use connections::Connections;
use directory::{Directory, SqliteDirectory};
use error::CoreError;
use feed::ChangeFeed;
use mentorship::MentorshipEngine;
use messaging::Messenger;
use notifications::Dispatcher;
use session::SignInRequired;
use store::SqliteStore;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub feed: ChangeFeed,
    pub directory: Arc<dyn Directory>,
    pub mentorship: MentorshipEngine,
    pub messaging: Messenger,
    pub notifications: Dispatcher,
    pub connections: Connections,
    pub activity: Activity,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: &Config) -> Self {
        Self::with_clock(db_pool, config, Arc::new(SystemClock))
    }

    /// Wires every service to one store, directory and change feed.
    pub fn with_clock(db_pool: SqlitePool, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let feed = ChangeFeed::with_capacity(config.feed_capacity);
        let store = Arc::new(SqliteStore::new(db_pool.clone(), feed.clone()));
        let directory: Arc<dyn Directory> = Arc::new(SqliteDirectory::new(db_pool.clone()));

        let notifications = Dispatcher::new(store.clone(), clock.clone(), config.notification_page_size);
        let mentorship = MentorshipEngine::new(store.clone(), directory.clone(), notifications.clone(), clock.clone());
        let messaging = Messenger::new(store.clone(), directory.clone(), notifications.clone(), clock.clone());
        let connections = Connections::new(store, directory.clone(), notifications.clone(), clock);
        let activity = Activity::new(directory.clone(), notifications.clone());

        Self {
            feed,
            directory,
            mentorship,
            messaging,
            notifications,
            connections,
            activity,
        }
    }
}

/// Every route, under the session and CORS layers.
pub fn app(state: AppState, config: &Config) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(config.session_idle_minutes)));

    Router::new()
        .merge(session::router(config.allow_directory_sign_in))
        .nest("/mentorship", mentorship::router())
        .nest("/messages", messaging::router())
        .nest("/notifications", notifications::router())
        .nest("/connections", connections::router())
        .merge(activity::router())
        .merge(feed::router())
        .with_state(state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn status(&self) -> StatusCode {
        if self.0.is::<SignInRequired>() {
            return StatusCode::UNAUTHORIZED;
        }
        match self.0.downcast_ref::<CoreError>() {
            Some(CoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            Some(CoreError::DuplicateRequest { .. } | CoreError::InvalidStateTransition { .. }) => StatusCode::CONFLICT,
            Some(CoreError::Authorization(_)) => StatusCode::FORBIDDEN,
            Some(CoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Some(CoreError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Some(CoreError::CorruptRow(_)) | None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
