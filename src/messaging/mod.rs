mod aggregator;
mod handlers;
mod service;
mod view;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub use aggregator::{Conversation, aggregate};
pub use service::{MAX_MESSAGE_CHARS, Messenger};
pub use view::ConversationView;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_conversations))
        .route("/unread", get(handlers::unread_total))
        .route("/{counterparty}", get(handlers::get_thread).post(handlers::send_message))
        .route("/{counterparty}/read", post(handlers::mark_conversation_read))
        .route("/{counterparty}/connect", post(handlers::send_connection_request))
}
