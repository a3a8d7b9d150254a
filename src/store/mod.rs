//! Typed store interfaces, one per entity.
//!
//! Every method is a single statement against the backing store, so each
//! call either commits completely or not at all. Implementations publish
//! each committed change on the [`ChangeFeed`](crate::feed::ChangeFeed).

mod sqlite;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::CoreResult,
    model::{Connection, MentorshipRequest, Message, Notification, RequestStatus},
};

pub use sqlite::SqliteStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQuery {
    pub student_id: Option<Uuid>,
    pub mentor_id: Option<Uuid>,
    pub status: Option<RequestStatus>,
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Fails with `DuplicateRequest` when the pair already has an open request.
    async fn insert_request(&self, request: &MentorshipRequest) -> CoreResult<()>;

    async fn get_request(&self, id: Uuid) -> CoreResult<Option<MentorshipRequest>>;

    async fn find_open_request(
        &self,
        student_id: Uuid,
        mentor_id: Uuid,
    ) -> CoreResult<Option<MentorshipRequest>>;

    /// Compare-and-set on status. `None` when the stored status was not `from`.
    async fn transition_request(
        &self,
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
        at: OffsetDateTime,
    ) -> CoreResult<Option<MentorshipRequest>>;

    /// Newest first.
    async fn query_requests(&self, query: &RequestQuery) -> CoreResult<Vec<MentorshipRequest>>;

    async fn count_requests(&self, query: &RequestQuery) -> CoreResult<u64>;
}

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// `false` when the edge already exists.
    async fn insert_connection(&self, connection: &Connection) -> CoreResult<bool>;

    async fn find_connection(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> CoreResult<Option<Connection>>;

    async fn delete_connection(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> CoreResult<Option<Connection>>;

    /// Edges pointing at `user_id`, newest first.
    async fn followers_of(&self, user_id: Uuid) -> CoreResult<Vec<Connection>>;

    /// Edges leaving `user_id`, newest first.
    async fn following_of(&self, user_id: Uuid) -> CoreResult<Vec<Connection>>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(&self, message: &Message) -> CoreResult<()>;

    /// Every message sent or received by `user_id`, oldest first.
    async fn messages_involving(&self, user_id: Uuid) -> CoreResult<Vec<Message>>;

    /// Messages between the two users in either direction, oldest first.
    async fn thread(&self, user_id: Uuid, counterparty_id: Uuid) -> CoreResult<Vec<Message>>;

    /// Marks unread `sender_id -> recipient_id` messages read and returns the rows it changed.
    async fn mark_read_from(&self, recipient_id: Uuid, sender_id: Uuid) -> CoreResult<Vec<Message>>;

    async fn count_unread(&self, recipient_id: Uuid) -> CoreResult<u64>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Inserting an id that is already stored changes nothing, so a retried
    /// insert never duplicates a notification.
    async fn insert_notification(&self, notification: &Notification) -> CoreResult<()>;

    async fn get_notification(&self, id: Uuid) -> CoreResult<Option<Notification>>;

    /// `None` when the notification is missing or already read.
    async fn mark_notification_read(&self, id: Uuid) -> CoreResult<Option<Notification>>;

    /// Returns the rows that changed.
    async fn mark_all_notifications_read(&self, user_id: Uuid) -> CoreResult<Vec<Notification>>;

    async fn delete_notification(&self, id: Uuid) -> CoreResult<Option<Notification>>;

    /// Newest first, at most `limit` rows.
    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: u32,
    ) -> CoreResult<Vec<Notification>>;

    async fn count_unread_notifications(&self, user_id: Uuid) -> CoreResult<u64>;
}
