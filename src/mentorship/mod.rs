mod engine;
mod handlers;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub use engine::{Direction, MAX_REQUEST_MESSAGE_CHARS, MentorshipEngine};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/requests", get(handlers::list_requests).post(handlers::request_mentorship))
        .route("/requests/{id}", get(handlers::get_request))
        .route("/requests/{id}/respond", post(handlers::respond_to_request))
        .route("/requests/{id}/complete", post(handlers::complete_mentorship))
}
