use axum::{
    Json, debug_handler,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{AppResult, AppState, connections::Connections, model::Connection, session::Actor};

#[debug_handler(state = AppState)]
pub(crate) async fn follow(
    State(connections): State<Connections>,
    Actor(follower_id): Actor,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Connection>> {
    Ok(Json(connections.follow(follower_id, user_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn unfollow(
    State(connections): State<Connections>,
    Actor(follower_id): Actor,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    connections.unfollow(follower_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler(state = AppState)]
pub(crate) async fn followers(
    State(connections): State<Connections>,
    Actor(user_id): Actor,
) -> AppResult<Json<Vec<Connection>>> {
    Ok(Json(connections.followers(user_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn following(
    State(connections): State<Connections>,
    Actor(user_id): Actor,
) -> AppResult<Json<Vec<Connection>>> {
    Ok(Json(connections.following(user_id).await?))
}
