use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    access::{self, Audience},
    clock::Clock,
    directory::{Directory, require_profile},
    error::{CoreError, CoreResult},
    model::{Decision, MentorshipRequest, NotificationType, RequestStatus, Role},
    notifications::{Dispatcher, NotificationDraft},
    store::{RequestQuery, RequestStore},
};

pub const MAX_REQUEST_MESSAGE_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
    All,
}

/// Owns the mentorship request state machine:
///
/// ```text
/// pending --accept(mentor)--> accepted --complete(either)--> completed
/// pending --reject(mentor)--> rejected
/// ```
#[derive(Clone)]
pub struct MentorshipEngine {
    requests: Arc<dyn RequestStore>,
    directory: Arc<dyn Directory>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
}

fn validate_message(message: &str) -> CoreResult<String> {
    let message = message.trim();
    let chars = message.chars().count();
    if chars == 0 {
        return Err(CoreError::validation("request message is empty"));
    }
    if chars > MAX_REQUEST_MESSAGE_CHARS {
        return Err(CoreError::validation(format!(
            "request message is {chars} characters, the limit is {MAX_REQUEST_MESSAGE_CHARS}"
        )));
    }
    Ok(message.to_owned())
}

impl MentorshipEngine {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        directory: Arc<dyn Directory>,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            requests,
            directory,
            dispatcher,
            clock,
        }
    }

    pub async fn request_mentorship(
        &self,
        student_id: Uuid,
        mentor_id: Uuid,
        message: &str,
    ) -> CoreResult<MentorshipRequest> {
        let message = validate_message(message)?;
        if student_id == mentor_id {
            return Err(CoreError::validation("cannot request mentorship from yourself"));
        }

        let student = require_profile(&*self.directory, student_id).await?;
        let mentor = require_profile(&*self.directory, mentor_id).await?;
        access::require(student.role, Audience::StudentsAndAdmins, "request mentorship")?;
        access::require(mentor.role, Audience::AlumniAndAdmins, "receive mentorship requests")?;

        if self.requests.find_open_request(student_id, mentor_id).await?.is_some() {
            return Err(CoreError::DuplicateRequest {
                student_id,
                mentor_id,
            });
        }

        let now = self.clock.now();
        let request = MentorshipRequest {
            id: Uuid::now_v7(),
            student_id,
            mentor_id,
            message,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        // a concurrent request for the same pair loses here, on the store's unique index
        self.requests.insert_request(&request).await?;
        info!(request_id = %request.id, %student_id, %mentor_id, "mentorship requested");

        let draft = NotificationDraft::new(
            NotificationType::Mentorship,
            "New mentorship request",
            format!("{} would like you to mentor them", student.display_name),
        )
        .related_to(request.id);
        self.dispatcher.notify_after_commit(student_id, mentor_id, draft).await;

        Ok(request)
    }

    pub async fn respond_to_request(
        &self,
        request_id: Uuid,
        actor_id: Uuid,
        decision: Decision,
    ) -> CoreResult<MentorshipRequest> {
        let request = self.load(request_id).await?;
        if actor_id != request.mentor_id {
            return Err(CoreError::unauthorized("only the mentor can respond to a request"));
        }

        let updated = self.transition(&request, decision.target()).await?;

        let (title, verb) = match decision {
            Decision::Accept => ("Mentorship request accepted", "accepted"),
            Decision::Reject => ("Mentorship request declined", "declined"),
        };
        let draft = NotificationDraft::new(
            NotificationType::Mentorship,
            title,
            format!("Your mentorship request was {verb}"),
        )
        .related_to(updated.id);
        self.dispatcher
            .notify_after_commit(actor_id, updated.student_id, draft)
            .await;

        Ok(updated)
    }

    pub async fn complete_mentorship(&self, request_id: Uuid, actor_id: Uuid) -> CoreResult<MentorshipRequest> {
        let request = self.load(request_id).await?;
        if !request.involves(actor_id) {
            return Err(CoreError::unauthorized(
                "only the student or the mentor can complete a mentorship",
            ));
        }

        let updated = self.transition(&request, RequestStatus::Completed).await?;

        // both parties, minus whoever acted
        for party in [updated.student_id, updated.mentor_id] {
            let draft = NotificationDraft::new(
                NotificationType::Mentorship,
                "Mentorship completed",
                "A mentorship you are part of was marked completed",
            )
            .related_to(updated.id);
            self.dispatcher.notify_after_commit(actor_id, party, draft).await;
        }

        Ok(updated)
    }

    pub async fn get_request(&self, request_id: Uuid, actor_id: Uuid) -> CoreResult<MentorshipRequest> {
        let request = self.load(request_id).await?;
        if request.involves(actor_id) {
            return Ok(request);
        }

        let actor = require_profile(&*self.directory, actor_id).await?;
        if actor.role != Role::Admin {
            return Err(CoreError::unauthorized("only the parties can view this request"));
        }
        Ok(request)
    }

    /// Newest first.
    pub async fn list_requests(
        &self,
        for_user_id: Uuid,
        direction: Direction,
        status: Option<RequestStatus>,
    ) -> CoreResult<Vec<MentorshipRequest>> {
        let profile = require_profile(&*self.directory, for_user_id).await?;

        let mut query = RequestQuery {
            status,
            ..RequestQuery::default()
        };
        match (profile.role, direction) {
            (Role::Student | Role::Admin, Direction::Sent) => query.student_id = Some(for_user_id),
            (Role::Alumni | Role::Admin, Direction::Received) => query.mentor_id = Some(for_user_id),
            (Role::Admin, Direction::All) => {}
            (role, direction) => {
                return Err(CoreError::unauthorized(format!(
                    "{role} profiles cannot list {direction:?} requests"
                )));
            }
        }

        self.requests.query_requests(&query).await
    }

    /// Sent for students, received for alumni, everything for admins.
    pub async fn default_direction(&self, user_id: Uuid) -> CoreResult<Direction> {
        let profile = require_profile(&*self.directory, user_id).await?;
        Ok(match profile.role {
            Role::Student => Direction::Sent,
            Role::Alumni => Direction::Received,
            Role::Admin => Direction::All,
        })
    }

    async fn load(&self, request_id: Uuid) -> CoreResult<MentorshipRequest> {
        self.requests
            .get_request(request_id)
            .await?
            .ok_or(CoreError::not_found("mentorship request", request_id))
    }

    async fn transition(&self, request: &MentorshipRequest, to: RequestStatus) -> CoreResult<MentorshipRequest> {
        if !request.status.can_become(to) {
            return Err(CoreError::InvalidStateTransition {
                from: request.status,
                to,
            });
        }

        let updated = self
            .requests
            .transition_request(request.id, request.status, to, self.clock.now())
            .await?;

        match updated {
            Some(updated) => {
                info!(request_id = %updated.id, from = %request.status, to = %updated.status, "mentorship request updated");
                Ok(updated)
            }
            // someone else moved it first
            None => {
                let current = self.load(request.id).await?;
                Err(CoreError::InvalidStateTransition {
                    from: current.status,
                    to,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_length_is_counted_in_characters() {
        assert!(validate_message("").is_err());
        assert!(validate_message("   ").is_err());
        assert_eq!(validate_message("  hello ").unwrap(), "hello");
        assert!(validate_message(&"é".repeat(1000)).is_ok());
        assert!(validate_message(&"x".repeat(1001)).is_err());
    }
}
