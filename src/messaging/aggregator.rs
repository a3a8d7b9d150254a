use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::model::Message;

/// One row of a user's inbox: everything exchanged with one other person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub counterparty_id: Uuid,
    pub latest_message: Message,
    pub unread_count: u64,
}

// ids are UUIDv7, so equal timestamps fall back to creation order
fn recency(message: &Message) -> (time::OffsetDateTime, Uuid) {
    (message.created_at, message.id)
}

/// Groups `messages` into conversations as seen by `viewer_id`.
///
/// Pure function of the message set: the input order does not matter and
/// messages the viewer is not party to are ignored. Conversations come back
/// most recent first.
pub fn aggregate<'a>(viewer_id: Uuid, messages: impl IntoIterator<Item = &'a Message>) -> Vec<Conversation> {
    let mut conversations: HashMap<Uuid, Conversation> = HashMap::new();

    for message in messages {
        let Some(counterparty_id) = message.counterparty(viewer_id) else {
            continue;
        };
        // a note to self is not a conversation
        if counterparty_id == viewer_id {
            continue;
        }

        let unread = u64::from(message.sender_id == counterparty_id && message.is_unread_for(viewer_id));
        conversations
            .entry(counterparty_id)
            .and_modify(|conversation| {
                if recency(message) > recency(&conversation.latest_message) {
                    conversation.latest_message = message.clone();
                }
                conversation.unread_count += unread;
            })
            .or_insert_with(|| Conversation {
                counterparty_id,
                latest_message: message.clone(),
                unread_count: unread,
            });
    }

    let mut conversations: Vec<Conversation> = conversations.into_values().collect();
    conversations.sort_by(|a, b| {
        recency(&b.latest_message)
            .cmp(&recency(&a.latest_message))
            .then(a.counterparty_id.cmp(&b.counterparty_id))
    });
    conversations
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::model::MessageKind;

    fn message(sender_id: Uuid, recipient_id: Uuid, at: time::OffsetDateTime) -> Message {
        Message {
            id: Uuid::now_v7(),
            sender_id,
            recipient_id,
            kind: MessageKind::Text,
            content: format!("{sender_id} at {at}"),
            read: false,
            created_at: at,
        }
    }

    #[test]
    fn three_message_exchange() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let t1 = message(a, b, datetime!(2024-05-01 10:00 UTC));
        let t2 = message(b, a, datetime!(2024-05-01 10:05 UTC));
        let t3 = message(a, b, datetime!(2024-05-01 10:10 UTC));

        let conversations = aggregate(a, [&t1, &t2, &t3]);
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].counterparty_id, b);
        assert_eq!(conversations[0].latest_message, t3);
        assert_eq!(conversations[0].unread_count, 1);

        // from b's side, a's two messages are unread
        let conversations = aggregate(b, [&t1, &t2, &t3]);
        assert_eq!(conversations[0].counterparty_id, a);
        assert_eq!(conversations[0].unread_count, 2);
    }

    #[test]
    fn input_order_does_not_matter() {
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let messages = vec![
            message(a, b, datetime!(2024-05-01 10:00 UTC)),
            message(c, a, datetime!(2024-05-01 11:00 UTC)),
            message(b, a, datetime!(2024-05-01 10:30 UTC)),
            message(a, c, datetime!(2024-05-01 09:00 UTC)),
        ];
        let forward = aggregate(a, &messages);
        let backward = aggregate(a, messages.iter().rev());
        assert_eq!(forward, backward);

        let order: Vec<_> = forward.iter().map(|c| c.counterparty_id).collect();
        assert_eq!(order, [c, b]);
    }

    #[test]
    fn equal_timestamps_prefer_the_later_message() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let at = datetime!(2024-05-01 10:00 UTC);
        let first = message(a, b, at);
        let second = message(b, a, at);

        let conversations = aggregate(a, [&second, &first]);
        assert_eq!(conversations[0].latest_message, second);
    }

    #[test]
    fn read_messages_and_strangers_are_not_counted() {
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let mut seen = message(b, a, datetime!(2024-05-01 10:00 UTC));
        seen.read = true;
        let unrelated = message(b, c, datetime!(2024-05-01 10:01 UTC));

        let conversations = aggregate(a, [&seen, &unrelated]);
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].unread_count, 0);
    }

    #[test]
    fn no_messages_no_conversations() {
        assert!(aggregate(Uuid::now_v7(), &Vec::new()).is_empty());
    }
}
