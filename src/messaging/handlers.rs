use axum::{
    Json, debug_handler,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    messaging::{Conversation, Messenger},
    model::Message,
    session::Actor,
};

#[derive(Debug, Deserialize)]
pub(crate) struct SendMessageBody {
    content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConnectBody {
    #[serde(default)]
    note: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct Count {
    count: u64,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_conversations(
    State(messenger): State<Messenger>,
    Actor(viewer_id): Actor,
) -> AppResult<Json<Vec<Conversation>>> {
    Ok(Json(messenger.list_conversations(viewer_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn get_thread(
    State(messenger): State<Messenger>,
    Actor(viewer_id): Actor,
    Path(counterparty_id): Path<Uuid>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(messenger.get_thread(viewer_id, counterparty_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn send_message(
    State(messenger): State<Messenger>,
    Actor(sender_id): Actor,
    Path(recipient_id): Path<Uuid>,
    Json(SendMessageBody { content }): Json<SendMessageBody>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let message = messenger
        .send_message(sender_id, recipient_id, &content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn send_connection_request(
    State(messenger): State<Messenger>,
    Actor(sender_id): Actor,
    Path(recipient_id): Path<Uuid>,
    body: Option<Json<ConnectBody>>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let note = body.map(|Json(body)| body.note).unwrap_or_default();
    let message = messenger
        .send_connection_request(sender_id, recipient_id, &note)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn mark_conversation_read(
    State(messenger): State<Messenger>,
    Actor(viewer_id): Actor,
    Path(counterparty_id): Path<Uuid>,
) -> AppResult<Json<Count>> {
    let count = messenger
        .mark_conversation_read(viewer_id, counterparty_id)
        .await?;
    Ok(Json(Count { count }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn unread_total(
    State(messenger): State<Messenger>,
    Actor(viewer_id): Actor,
) -> AppResult<Json<Count>> {
    let count = messenger.unread_total(viewer_id).await?;
    Ok(Json(Count { count }))
}
