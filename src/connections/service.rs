use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::{
    clock::Clock,
    directory::{Directory, require_profile},
    error::{CoreError, CoreResult},
    model::{Connection, NotificationType},
    notifications::{Dispatcher, NotificationDraft},
    store::ConnectionStore,
};

/// Follow edges. No approval step: the follower creates and removes them.
#[derive(Clone)]
pub struct Connections {
    connections: Arc<dyn ConnectionStore>,
    directory: Arc<dyn Directory>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
}

impl Connections {
    pub fn new(
        connections: Arc<dyn ConnectionStore>,
        directory: Arc<dyn Directory>,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            connections,
            directory,
            dispatcher,
            clock,
        }
    }

    /// Following someone twice returns the existing edge and notifies nobody.
    pub async fn follow(&self, actor_id: Uuid, target_id: Uuid) -> CoreResult<Connection> {
        if actor_id == target_id {
            return Err(CoreError::validation("cannot follow yourself"));
        }
        let follower = require_profile(&*self.directory, actor_id).await?;
        require_profile(&*self.directory, target_id).await?;

        let connection = Connection {
            id: Uuid::now_v7(),
            follower_id: actor_id,
            following_id: target_id,
            created_at: self.clock.now(),
        };
        if !self.connections.insert_connection(&connection).await? {
            return self
                .connections
                .find_connection(actor_id, target_id)
                .await?
                .ok_or(CoreError::not_found("connection", connection.id));
        }
        info!(follower_id = %actor_id, following_id = %target_id, "followed");

        let draft = NotificationDraft::new(
            NotificationType::Connection,
            "New follower",
            format!("{} started following you", follower.display_name),
        )
        .related_to(actor_id);
        self.dispatcher
            .notify_after_commit(actor_id, target_id, draft)
            .await;

        Ok(connection)
    }

    /// `false` when there was nothing to remove.
    pub async fn unfollow(&self, actor_id: Uuid, target_id: Uuid) -> CoreResult<bool> {
        let removed = self.connections.delete_connection(actor_id, target_id).await?;
        if removed.is_some() {
            info!(follower_id = %actor_id, following_id = %target_id, "unfollowed");
        }
        Ok(removed.is_some())
    }

    pub async fn followers(&self, user_id: Uuid) -> CoreResult<Vec<Connection>> {
        self.connections.followers_of(user_id).await
    }

    pub async fn following(&self, user_id: Uuid) -> CoreResult<Vec<Connection>> {
        self.connections.following_of(user_id).await
    }
}
