use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    access::{self, Audience},
    directory::{Directory, ProfileFilter, require_profile},
    error::{CoreError, CoreResult},
    model::{Notification, NotificationType, Role},
    notifications::{Dispatcher, NotificationDraft},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostActivity {
    Like,
    Comment,
}

/// The parts of a post the notification rules need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    pub id: Uuid,
    pub author_id: Uuid,
    pub audience: Audience,
}

/// Notifications raised by features outside the messaging and mentorship core.
#[derive(Clone)]
pub struct Activity {
    directory: Arc<dyn Directory>,
    dispatcher: Dispatcher,
}

impl Activity {
    pub fn new(directory: Arc<dyn Directory>, dispatcher: Dispatcher) -> Self {
        Self {
            directory,
            dispatcher,
        }
    }

    /// Sends an announcement to everyone in `audience` but the author.
    /// Returns how many notifications were created.
    pub async fn announce(
        &self,
        actor_id: Uuid,
        audience: Audience,
        title: &str,
        content: &str,
    ) -> CoreResult<usize> {
        let actor = require_profile(&*self.directory, actor_id).await?;
        if actor.role != Role::Admin {
            return Err(CoreError::unauthorized("only admins can post announcements"));
        }
        if title.trim().is_empty() {
            return Err(CoreError::validation("announcement title is empty"));
        }

        let recipients = self
            .directory
            .list_profiles(ProfileFilter::audience(audience))
            .await?;

        let mut delivered = 0;
        for recipient in recipients {
            let draft = NotificationDraft::new(NotificationType::Announcement, title.trim(), content);
            if self
                .dispatcher
                .notify_unless_self(actor_id, recipient.id, draft)
                .await?
                .is_some()
            {
                delivered += 1;
            }
        }

        info!(%actor_id, ?audience, delivered, "announcement sent");
        Ok(delivered)
    }

    /// Tells a post's author someone liked or commented on it.
    pub async fn notify_post_activity(
        &self,
        actor_id: Uuid,
        post: PostRef,
        activity: PostActivity,
    ) -> CoreResult<Option<Notification>> {
        let actor = require_profile(&*self.directory, actor_id).await?;
        access::require(actor.role, post.audience, "see this post")?;

        let (title, verb) = match activity {
            PostActivity::Like => ("New like", "liked"),
            PostActivity::Comment => ("New comment", "commented on"),
        };
        let draft = NotificationDraft::new(
            NotificationType::Post,
            title,
            format!("{} {verb} your post", actor.display_name),
        )
        .related_to(post.id);

        self.dispatcher
            .notify_unless_self(actor_id, post.author_id, draft)
            .await
    }
}
