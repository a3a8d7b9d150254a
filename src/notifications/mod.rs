mod dispatcher;
mod handlers;
mod inbox;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::AppState;

pub use dispatcher::{Dispatcher, NotificationDraft, NotificationFilter};
pub use inbox::NotificationInbox;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_notifications))
        .route("/unread", get(handlers::unread_count))
        .route("/read", post(handlers::mark_all_read))
        .route("/{id}/read", post(handlers::mark_read))
        .route("/{id}", delete(handlers::delete_notification))
}
