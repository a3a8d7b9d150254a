use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::aggregator::{Conversation, aggregate};
use crate::{
    clock::Clock,
    directory::{Directory, require_profile},
    error::{CoreError, CoreResult},
    model::{Message, MessageKind, NotificationType},
    notifications::{Dispatcher, NotificationDraft},
    store::MessageStore,
};

pub const MAX_MESSAGE_CHARS: usize = 4000;
const PREVIEW_CHARS: usize = 80;

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

fn validate_content(content: &str) -> CoreResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(CoreError::validation("message is empty"));
    }
    let chars = content.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(CoreError::validation(format!(
            "message is {chars} characters, the limit is {MAX_MESSAGE_CHARS}"
        )));
    }
    Ok(content.to_owned())
}

/// Direct messages and the conversation list computed from them.
#[derive(Clone)]
pub struct Messenger {
    messages: Arc<dyn MessageStore>,
    directory: Arc<dyn Directory>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
}

impl Messenger {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        directory: Arc<dyn Directory>,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            messages,
            directory,
            dispatcher,
            clock,
        }
    }

    pub async fn send_message(&self, sender_id: Uuid, recipient_id: Uuid, content: &str) -> CoreResult<Message> {
        let content = validate_content(content)?;
        self.send(sender_id, recipient_id, MessageKind::Text, content).await
    }

    /// A message tagged as a connection request. The note may be left blank.
    pub async fn send_connection_request(&self, sender_id: Uuid, recipient_id: Uuid, note: &str) -> CoreResult<Message> {
        let content = if note.trim().is_empty() {
            String::new()
        } else {
            validate_content(note)?
        };
        self.send(sender_id, recipient_id, MessageKind::ConnectionRequest, content)
            .await
    }

    async fn send(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        kind: MessageKind,
        content: String,
    ) -> CoreResult<Message> {
        if sender_id == recipient_id {
            return Err(CoreError::validation("cannot send a message to yourself"));
        }
        let sender = require_profile(&*self.directory, sender_id).await?;
        require_profile(&*self.directory, recipient_id).await?;

        let message = Message {
            id: Uuid::now_v7(),
            sender_id,
            recipient_id,
            kind,
            content,
            read: false,
            created_at: self.clock.now(),
        };
        self.messages.insert_message(&message).await?;
        info!(message_id = %message.id, %sender_id, %recipient_id, %kind, "message sent");

        let draft = match kind {
            MessageKind::Text => NotificationDraft::new(
                NotificationType::Message,
                format!("New message from {}", sender.display_name),
                preview(&message.content),
            ),
            MessageKind::ConnectionRequest => NotificationDraft::new(
                NotificationType::Connection,
                format!("{} wants to connect", sender.display_name),
                preview(&message.content),
            ),
        }
        .related_to(sender_id);
        self.dispatcher
            .notify_after_commit(sender_id, recipient_id, draft)
            .await;

        Ok(message)
    }

    /// Most recently active first.
    pub async fn list_conversations(&self, viewer_id: Uuid) -> CoreResult<Vec<Conversation>> {
        let messages = self.messages.messages_involving(viewer_id).await?;
        Ok(aggregate(viewer_id, &messages))
    }

    /// Oldest first.
    pub async fn get_thread(&self, viewer_id: Uuid, counterparty_id: Uuid) -> CoreResult<Vec<Message>> {
        self.messages.thread(viewer_id, counterparty_id).await
    }

    /// Returns how many messages changed; zero when there was nothing unread.
    pub async fn mark_conversation_read(&self, viewer_id: Uuid, counterparty_id: Uuid) -> CoreResult<u64> {
        let changed = self.messages.mark_read_from(viewer_id, counterparty_id).await?;
        debug!(%viewer_id, %counterparty_id, changed = changed.len(), "conversation marked read");
        Ok(changed.len() as u64)
    }

    pub async fn unread_total(&self, viewer_id: Uuid) -> CoreResult<u64> {
        self.messages.count_unread(viewer_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_content() {
        assert_eq!(preview("short"), "short");
        let long = "a".repeat(200);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 1);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn content_is_trimmed_and_bounded() {
        assert!(validate_content(" \n ").is_err());
        assert_eq!(validate_content(" hi ").unwrap(), "hi");
        assert!(validate_content(&"m".repeat(MAX_MESSAGE_CHARS + 1)).is_err());
    }
}
