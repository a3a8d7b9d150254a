use axum::{
    Json, debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    model::Notification,
    notifications::{Dispatcher, NotificationFilter},
    session::Actor,
};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    filter: NotificationFilter,
}

#[derive(Debug, Serialize)]
pub(crate) struct Count {
    count: u64,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_notifications(
    State(dispatcher): State<Dispatcher>,
    Actor(user_id): Actor,
    Query(ListQuery { filter }): Query<ListQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    Ok(Json(dispatcher.list_notifications(user_id, filter).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn unread_count(
    State(dispatcher): State<Dispatcher>,
    Actor(user_id): Actor,
) -> AppResult<Json<Count>> {
    let count = dispatcher.unread_count(user_id).await?;
    Ok(Json(Count { count }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn mark_read(
    State(dispatcher): State<Dispatcher>,
    Actor(user_id): Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Notification>> {
    Ok(Json(dispatcher.mark_read(id, user_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn mark_all_read(
    State(dispatcher): State<Dispatcher>,
    Actor(user_id): Actor,
) -> AppResult<Json<Count>> {
    let count = dispatcher.mark_all_read(user_id).await?;
    Ok(Json(Count { count }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_notification(
    State(dispatcher): State<Dispatcher>,
    Actor(user_id): Actor,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    dispatcher.delete(id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
