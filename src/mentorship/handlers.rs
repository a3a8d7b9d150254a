use axum::{
    Json, debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    mentorship::{Direction, MentorshipEngine},
    model::{Decision, MentorshipRequest, RequestStatus},
    session::Actor,
};

#[derive(Debug, Deserialize)]
pub(crate) struct NewRequestBody {
    mentor_id: Uuid,
    message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListRequestsQuery {
    direction: Option<Direction>,
    status: Option<RequestStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RespondBody {
    decision: Decision,
}

#[debug_handler(state = AppState)]
pub(crate) async fn request_mentorship(
    State(engine): State<MentorshipEngine>,
    Actor(student_id): Actor,
    Json(NewRequestBody { mentor_id, message }): Json<NewRequestBody>,
) -> AppResult<(StatusCode, Json<MentorshipRequest>)> {
    let request = engine
        .request_mentorship(student_id, mentor_id, &message)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Students see what they sent and alumni what they received unless they ask
/// otherwise.
#[debug_handler(state = AppState)]
pub(crate) async fn list_requests(
    State(engine): State<MentorshipEngine>,
    Actor(user_id): Actor,
    Query(ListRequestsQuery { direction, status }): Query<ListRequestsQuery>,
) -> AppResult<Json<Vec<MentorshipRequest>>> {
    let direction = match direction {
        Some(direction) => direction,
        None => engine.default_direction(user_id).await?,
    };
    Ok(Json(engine.list_requests(user_id, direction, status).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn get_request(
    State(engine): State<MentorshipEngine>,
    Actor(user_id): Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MentorshipRequest>> {
    Ok(Json(engine.get_request(id, user_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn respond_to_request(
    State(engine): State<MentorshipEngine>,
    Actor(mentor_id): Actor,
    Path(id): Path<Uuid>,
    Json(RespondBody { decision }): Json<RespondBody>,
) -> AppResult<Json<MentorshipRequest>> {
    Ok(Json(engine.respond_to_request(id, mentor_id, decision).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn complete_mentorship(
    State(engine): State<MentorshipEngine>,
    Actor(user_id): Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MentorshipRequest>> {
    Ok(Json(engine.complete_mentorship(id, user_id).await?))
}
