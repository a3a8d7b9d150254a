mod service;

use axum::{Json, Router, debug_handler, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use crate::{AppResult, AppState, access::Audience, session::Actor};

pub use service::{Activity, PostActivity, PostRef};

#[derive(Debug, Deserialize)]
pub(crate) struct AnnouncementBody {
    #[serde(default)]
    audience: Audience,
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct Delivered {
    delivered: usize,
}

#[debug_handler(state = AppState)]
pub(crate) async fn announce(
    State(activity): State<Activity>,
    Actor(admin_id): Actor,
    Json(AnnouncementBody { audience, title, content }): Json<AnnouncementBody>,
) -> AppResult<Json<Delivered>> {
    let delivered = activity.announce(admin_id, audience, &title, &content).await?;
    Ok(Json(Delivered { delivered }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/announcements", post(announce))
}
