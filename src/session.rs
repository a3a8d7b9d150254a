use std::sync::Arc;

use axum::{
    Json, Router, debug_handler,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
    routing::{delete, post},
};
use serde::Deserialize;
use thiserror::Error;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppError, AppResult, AppState,
    directory::{Directory, require_profile},
    model::Profile,
};

pub const USER_ID: &str = "user_id";

#[derive(Debug, Error)]
#[error("sign in required")]
pub struct SignInRequired;

/// The signed-in user, read from the session's `user_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub Uuid);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| anyhow::anyhow!(msg))?;
        let user_id = session.get::<Uuid>(USER_ID).await?.ok_or(SignInRequired)?;
        Ok(Actor(user_id))
    }
}

#[derive(Deserialize)]
pub(crate) struct SignInBody {
    user_id: Uuid,
}

/// Signs in as any profile in the directory. Only mounted when
/// `ALLOW_DIRECTORY_SIGN_IN` is set; otherwise the upstream sign-in layer
/// writes `user_id` into the session itself.
#[debug_handler(state = AppState)]
pub(crate) async fn sign_in(
    State(directory): State<Arc<dyn Directory>>,
    session: Session,
    Json(SignInBody { user_id }): Json<SignInBody>,
) -> AppResult<Json<Profile>> {
    let profile = require_profile(&*directory, user_id).await?;

    session.cycle_id().await?;
    session.insert(USER_ID, profile.id).await?;
    info!(user_id = %profile.id, role = %profile.role, "signed in");

    Ok(Json(profile))
}

/// Deletes the session from the store, so the old cookie no longer signs anyone in.
#[debug_handler]
pub(crate) async fn sign_out(session: Session) -> AppResult<StatusCode> {
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(allow_directory_sign_in: bool) -> Router<AppState> {
    if allow_directory_sign_in {
        Router::new().route("/session", post(sign_in).delete(sign_out))
    } else {
        Router::new().route("/session", delete(sign_out))
    }
}
