//! Change feed over the stores.
//!
//! Every committed insert, update or delete is published here. Subscribers
//! pick the rows they care about with a [`FeedFilter`]; a subscriber that
//! falls behind is told so and is expected to re-query the store.

mod ws;

use axum::{Router, routing::get};
use futures_util::{Stream, stream};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    AppState,
    model::{Connection, MentorshipRequest, Message, Notification},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/feed/ws", get(ws::feed_ws))
}

pub const DEFAULT_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    MentorshipRequest,
    Connection,
    Message,
    Notification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", content = "row", rename_all = "snake_case")]
pub enum Row {
    MentorshipRequest(MentorshipRequest),
    Connection(Connection),
    Message(Message),
    Notification(Notification),
}

impl Row {
    pub fn kind(&self) -> EntityKind {
        match self {
            Row::MentorshipRequest(_) => EntityKind::MentorshipRequest,
            Row::Connection(_) => EntityKind::Connection,
            Row::Message(_) => EntityKind::Message,
            Row::Notification(_) => EntityKind::Notification,
        }
    }

    /// Whether `user_id` is one of the people this row belongs to.
    pub fn involves(&self, user_id: Uuid) -> bool {
        match self {
            Row::MentorshipRequest(request) => request.involves(user_id),
            Row::Connection(connection) => {
                connection.follower_id == user_id || connection.following_id == user_id
            }
            Row::Message(message) => message.counterparty(user_id).is_some(),
            Row::Notification(notification) => notification.user_id == user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub operation: Operation,
    #[serde(flatten)]
    pub row: Row,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    pub entity: Option<EntityKind>,
    pub user_id: Option<Uuid>,
}

impl FeedFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            entity: None,
            user_id: Some(user_id),
        }
    }

    pub fn entity(mut self, entity: EntityKind) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.entity.is_none_or(|kind| kind == event.row.kind())
            && self.user_id.is_none_or(|user_id| event.row.involves(user_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Events were dropped before this subscriber read them; re-query to catch up.
    #[error("subscriber missed {0} events")]
    Lagged(u64),

    #[error("change feed closed")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscriptions were handed the event.
    pub fn publish(&self, operation: Operation, row: Row) -> usize {
        let entity = row.kind();
        match self.sender.send(ChangeEvent { operation, row }) {
            Ok(receivers) => {
                debug!(?entity, ?operation, receivers, "change published");
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self, filter: FeedFilter) -> Subscription {
        debug!(?filter, "feed subscription opened");
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller-owned handle on the feed. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: FeedFilter,
}

impl Subscription {
    /// Waits for the next event matching the filter.
    pub async fn recv(&mut self) -> Result<ChangeEvent, FeedError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Ok(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, filter = ?self.filter, "feed subscriber lagged");
                    return Err(FeedError::Lagged(missed));
                }
                Err(broadcast::error::RecvError::Closed) => return Err(FeedError::Closed),
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `Ok(None)` when nothing is queued.
    pub fn try_recv(&mut self) -> Result<Option<ChangeEvent>, FeedError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    return Err(FeedError::Lagged(missed));
                }
                Err(broadcast::error::TryRecvError::Closed) => return Err(FeedError::Closed),
            }
        }
    }

    pub fn filter(&self) -> &FeedFilter {
        &self.filter
    }

    /// Stream of matching events and lag notices, ending when the feed closes.
    pub fn into_stream(self) -> impl Stream<Item = Result<ChangeEvent, FeedError>> + Send {
        stream::unfold(self, |mut subscription| async move {
            match subscription.recv().await {
                Err(FeedError::Closed) => None,
                next => Some((next, subscription)),
            }
        })
    }

    pub fn unsubscribe(self) {
        debug!(filter = ?self.filter, "feed subscription closed");
    }
}
