use std::collections::HashMap;

use uuid::Uuid;

use super::aggregator::{Conversation, aggregate};
use crate::{
    feed::{ChangeEvent, Operation, Row},
    model::Message,
};

/// Client-side conversation list for one viewer.
///
/// Holds the raw messages and recomputes conversations from them, so it ends
/// up in the same state whether events arrive in order, out of order, twice,
/// not at all before the next pull, or interleaved with one.
#[derive(Debug, Clone)]
pub struct ConversationView {
    viewer_id: Uuid,
    messages: HashMap<Uuid, Message>,
}

impl ConversationView {
    pub fn new(viewer_id: Uuid) -> Self {
        Self {
            viewer_id,
            messages: HashMap::new(),
        }
    }

    /// Folds in a pull; rows already known keep their read flag if it was set.
    pub fn merge_pull(&mut self, pulled: impl IntoIterator<Item = Message>) {
        for message in pulled {
            self.upsert(message);
        }
    }

    pub fn apply(&mut self, event: &ChangeEvent) -> bool {
        let Row::Message(message) = &event.row else {
            return false;
        };
        if message.counterparty(self.viewer_id).is_none() {
            return false;
        }

        match event.operation {
            Operation::Insert | Operation::Update => self.upsert(message.clone()),
            Operation::Delete => {
                self.messages.remove(&message.id);
            }
        }
        true
    }

    fn upsert(&mut self, message: Message) {
        if message.counterparty(self.viewer_id).is_none() {
            return;
        }
        self.messages
            .entry(message.id)
            .and_modify(|existing| existing.read |= message.read)
            .or_insert(message);
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        aggregate(self.viewer_id, self.messages.values())
    }

    pub fn unread_total(&self) -> u64 {
        self.conversations().iter().map(|c| c.unread_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::model::MessageKind;

    fn message(sender_id: Uuid, recipient_id: Uuid, minute: u8) -> Message {
        Message {
            id: Uuid::now_v7(),
            sender_id,
            recipient_id,
            kind: MessageKind::Text,
            content: format!("minute {minute}"),
            read: false,
            created_at: datetime!(2024-05-01 10:00 UTC) + time::Duration::minutes(minute.into()),
        }
    }

    fn insert(message: &Message) -> ChangeEvent {
        ChangeEvent {
            operation: Operation::Insert,
            row: Row::Message(message.clone()),
        }
    }

    fn mark_read(message: &Message) -> ChangeEvent {
        ChangeEvent {
            operation: Operation::Update,
            row: Row::Message(Message {
                read: true,
                ..message.clone()
            }),
        }
    }

    #[test]
    fn push_and_pull_converge() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let m1 = message(a, b, 0);
        let m2 = message(b, a, 5);
        let m3 = message(a, b, 10);

        let mut pushed = ConversationView::new(a);
        for event in [insert(&m3), mark_read(&m2), insert(&m1), insert(&m2), insert(&m3)] {
            pushed.apply(&event);
        }

        let mut pulled = ConversationView::new(a);
        pulled.merge_pull([m1.clone(), Message { read: true, ..m2.clone() }, m3.clone()]);

        assert_eq!(pushed.conversations(), pulled.conversations());
        assert_eq!(pushed.unread_total(), 0);
        assert_eq!(pushed.conversations()[0].latest_message.id, m3.id);
    }

    #[test]
    fn stale_pull_does_not_clear_read_flag() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let incoming = message(b, a, 0);

        let mut view = ConversationView::new(a);
        view.apply(&mark_read(&incoming));
        view.merge_pull([incoming.clone()]);
        assert_eq!(view.unread_total(), 0);
    }

    #[test]
    fn foreign_rows_are_ignored() {
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let mut view = ConversationView::new(a);
        assert!(!view.apply(&insert(&message(b, c, 0))));
        assert!(view.conversations().is_empty());
    }
}
