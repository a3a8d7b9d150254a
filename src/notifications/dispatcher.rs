use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    clock::Clock,
    error::{CoreError, CoreResult},
    model::{Notification, NotificationType},
    store::NotificationStore,
};

/// Tries a post-commit dispatch gets before it is given up on.
pub const DISPATCH_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub kind: NotificationType,
    pub title: String,
    pub content: String,
    pub related_id: Option<Uuid>,
}

impl NotificationDraft {
    pub fn new(kind: NotificationType, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            content: content.into(),
            related_id: None,
        }
    }

    pub fn related_to(mut self, related_id: Uuid) -> Self {
        self.related_id = Some(related_id);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationFilter {
    #[default]
    All,
    Unread,
}

/// The only place notifications are created.
///
/// `dispatch` has no notion of who caused a notification, so callers must not
/// address one to the acting user; [`Dispatcher::notify_unless_self`] does
/// that check for them.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn NotificationStore>,
    clock: Arc<dyn Clock>,
    page_size: u32,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn NotificationStore>, clock: Arc<dyn Clock>, page_size: u32) -> Self {
        Self {
            store,
            clock,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn build(&self, recipient_id: Uuid, draft: NotificationDraft) -> CoreResult<Notification> {
        if draft.title.trim().is_empty() {
            return Err(CoreError::validation("notification title is empty"));
        }

        Ok(Notification {
            id: Uuid::now_v7(),
            user_id: recipient_id,
            kind: draft.kind,
            title: draft.title,
            content: draft.content,
            read: false,
            related_id: draft.related_id,
            created_at: self.clock.now(),
        })
    }

    pub async fn dispatch(&self, recipient_id: Uuid, draft: NotificationDraft) -> CoreResult<Notification> {
        let notification = self.build(recipient_id, draft)?;
        self.store.insert_notification(&notification).await?;
        log_dispatched(&notification);
        Ok(notification)
    }

    pub async fn notify_unless_self(
        &self,
        actor_id: Uuid,
        recipient_id: Uuid,
        draft: NotificationDraft,
    ) -> CoreResult<Option<Notification>> {
        if actor_id == recipient_id {
            debug!(user_id = %actor_id, kind = %draft.kind, "self notification skipped");
            return Ok(None);
        }
        self.dispatch(recipient_id, draft).await.map(Some)
    }

    /// For callers whose own write has already committed, so a failed dispatch
    /// cannot fail the operation that caused it.
    ///
    /// An unavailable store is retried up to [`DISPATCH_ATTEMPTS`] times with
    /// the same notification id, so a retry never produces a second copy.
    /// Returns `None` when the recipient is the actor or every attempt failed.
    pub(crate) async fn notify_after_commit(
        &self,
        actor_id: Uuid,
        recipient_id: Uuid,
        draft: NotificationDraft,
    ) -> Option<Notification> {
        if actor_id == recipient_id {
            debug!(user_id = %actor_id, kind = %draft.kind, "self notification skipped");
            return None;
        }
        let kind = draft.kind;
        let notification = match self.build(recipient_id, draft) {
            Ok(notification) => notification,
            Err(err) => {
                warn!(user_id = %recipient_id, %kind, error = %err, "notification dispatch failed");
                return None;
            }
        };

        let mut attempt = 1;
        loop {
            match self.store.insert_notification(&notification).await {
                Ok(()) => {
                    log_dispatched(&notification);
                    return Some(notification);
                }
                Err(CoreError::StoreUnavailable(err)) if attempt < DISPATCH_ATTEMPTS => {
                    warn!(user_id = %recipient_id, %kind, attempt, error = %err, "notification dispatch failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(user_id = %recipient_id, %kind, attempt, error = %err, "notification dispatch failed");
                    return None;
                }
            }
        }
    }

    async fn owned(&self, notification_id: Uuid, actor_id: Uuid) -> CoreResult<Notification> {
        let notification = self
            .store
            .get_notification(notification_id)
            .await?
            .ok_or(CoreError::not_found("notification", notification_id))?;

        if notification.user_id != actor_id {
            return Err(CoreError::unauthorized("notifications can only be changed by their recipient"));
        }
        Ok(notification)
    }

    pub async fn mark_read(&self, notification_id: Uuid, actor_id: Uuid) -> CoreResult<Notification> {
        let notification = self.owned(notification_id, actor_id).await?;
        if notification.read {
            return Ok(notification);
        }

        let updated = self.store.mark_notification_read(notification_id).await?;
        Ok(updated.unwrap_or(Notification {
            read: true,
            ..notification
        }))
    }

    /// Returns how many notifications changed; zero is fine.
    pub async fn mark_all_read(&self, user_id: Uuid) -> CoreResult<u64> {
        let changed = self.store.mark_all_notifications_read(user_id).await?;
        debug!(%user_id, changed = changed.len(), "notifications marked read");
        Ok(changed.len() as u64)
    }

    pub async fn delete(&self, notification_id: Uuid, actor_id: Uuid) -> CoreResult<()> {
        self.owned(notification_id, actor_id).await?;
        self.store
            .delete_notification(notification_id)
            .await?
            .ok_or(CoreError::not_found("notification", notification_id))?;

        info!(%notification_id, user_id = %actor_id, "notification deleted");
        Ok(())
    }

    /// Newest first, one page.
    pub async fn list_notifications(&self, user_id: Uuid, filter: NotificationFilter) -> CoreResult<Vec<Notification>> {
        self.store
            .list_notifications(user_id, filter == NotificationFilter::Unread, self.page_size)
            .await
    }

    pub async fn unread_count(&self, user_id: Uuid) -> CoreResult<u64> {
        self.store.count_unread_notifications(user_id).await
    }
}

fn log_dispatched(notification: &Notification) {
    info!(
        notification_id = %notification.id,
        user_id = %notification.user_id,
        kind = %notification.kind,
        "notification dispatched"
    );
}
