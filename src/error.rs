use thiserror::Error;
use uuid::Uuid;

use crate::model::RequestStatus;

/// Failures returned by the mentorship, messaging and notification services.
///
/// Everything except `StoreUnavailable` and `CorruptRow` is detected before
/// any write is attempted.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("an open mentorship request already exists from {student_id} to {mentor_id}")]
    DuplicateRequest { student_id: Uuid, mentor_id: Uuid },

    #[error("cannot move a {from} request to {to}")]
    InvalidStateTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("not allowed: {0}")]
    Authorization(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),

    #[error("stored row could not be decoded: {0}")]
    CorruptRow(#[source] sqlx::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
                Self::CorruptRow(err)
            }
            err => Self::StoreUnavailable(err),
        }
    }
}
