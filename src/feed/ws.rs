use axum::{
    debug_handler,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message as Frame, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ChangeFeed, EntityKind, FeedError, FeedFilter, Subscription};
use crate::{AppState, session::Actor};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FeedQuery {
    entity: Option<EntityKind>,
}

/// Pushes every change that involves the signed-in user as a JSON frame.
///
/// A `{"resync":true}` frame means events were dropped and the client should
/// pull its lists again before trusting further pushes.
#[debug_handler(state = AppState)]
pub(crate) async fn feed_ws(
    State(feed): State<ChangeFeed>,
    Actor(user_id): Actor,
    Query(FeedQuery { entity }): Query<FeedQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let mut filter = FeedFilter::for_user(user_id);
    if let Some(entity) = entity {
        filter = filter.entity(entity);
    }

    ws.on_upgrade(async move |socket| serve(socket, feed, filter, user_id).await)
}

async fn serve(socket: WebSocket, feed: ChangeFeed, filter: FeedFilter, user_id: Uuid) {
    let mut subscription = feed.subscribe(filter);
    let (mut sender, mut receiver) = socket.split();
    debug!(%user_id, "feed socket opened");

    let mut push_task = tokio::spawn(async move {
        while let Some(frame) = next_frame(&mut subscription).await {
            if sender.send(Frame::Text(frame.into())).await.is_err() {
                break;
            }
        }
        subscription.unsubscribe();
    });

    // the client only ever closes; anything else it sends is ignored
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = receiver.next().await {
            if let Frame::Close(_) = frame {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut push_task => recv_task.abort(),
        _ = &mut recv_task => push_task.abort(),
    };
    debug!(%user_id, "feed socket closed");
}

/// The next text frame for the socket, or `None` once the feed has closed.
async fn next_frame(subscription: &mut Subscription) -> Option<String> {
    loop {
        match subscription.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(text) => return Some(text),
                Err(err) => warn!(error = %err, "change event did not serialize"),
            },
            Err(FeedError::Lagged(missed)) => {
                return Some(json!({ "resync": true, "missed": missed }).to_string());
            }
            Err(FeedError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use time::macros::datetime;

    use super::*;
    use crate::{
        feed::{Operation, Row},
        model::{Notification, NotificationType},
    };

    fn notification(user_id: Uuid) -> Row {
        Row::Notification(Notification {
            id: Uuid::now_v7(),
            user_id,
            kind: NotificationType::Message,
            title: "New message".to_owned(),
            content: String::new(),
            read: false,
            related_id: None,
            created_at: datetime!(2024-01-01 10:00 UTC),
        })
    }

    #[tokio::test]
    async fn events_become_json_frames() {
        let feed = ChangeFeed::new();
        let alice = Uuid::now_v7();
        let mut sub = feed.subscribe(FeedFilter::for_user(alice));
        feed.publish(Operation::Insert, notification(alice));

        let frame: Value = serde_json::from_str(&next_frame(&mut sub).await.unwrap()).unwrap();
        assert_eq!(frame["operation"], "insert");
        assert_eq!(frame["entity"], "notification");
        assert_eq!(frame["row"]["user_id"], alice.to_string());
    }

    #[tokio::test]
    async fn lagging_socket_gets_a_resync_frame() {
        let feed = ChangeFeed::with_capacity(2);
        let alice = Uuid::now_v7();
        let mut sub = feed.subscribe(FeedFilter::for_user(alice));
        for _ in 0..5 {
            feed.publish(Operation::Insert, notification(alice));
        }

        let frame: Value = serde_json::from_str(&next_frame(&mut sub).await.unwrap()).unwrap();
        assert_eq!(frame["resync"], true);
        assert_eq!(frame["missed"], 3);

        let next: Value = serde_json::from_str(&next_frame(&mut sub).await.unwrap()).unwrap();
        assert_eq!(next["entity"], "notification");
    }

    #[tokio::test]
    async fn closed_feed_ends_the_frames() {
        let feed = ChangeFeed::new();
        let mut sub = feed.subscribe(FeedFilter::all());
        drop(feed);
        assert!(next_frame(&mut sub).await.is_none());
    }
}
