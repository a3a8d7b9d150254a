use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::{
    feed::{ChangeEvent, Operation, Row},
    model::Notification,
};

/// Client-side notification list kept current from the change feed.
///
/// A pull through [`reset`](Self::reset) replaces the list; feed events only
/// make it fresher between pulls. Read flags only ever go from unread to read,
/// and a deleted notification is not brought back by a late insert, a late
/// update or a pull that was answered before the delete. Ids are never
/// reused, so tombstones are kept for the life of the inbox.
#[derive(Debug, Clone)]
pub struct NotificationInbox {
    user_id: Uuid,
    page_size: usize,
    items: HashMap<Uuid, Notification>,
    deleted: HashSet<Uuid>,
}

impl NotificationInbox {
    pub fn new(user_id: Uuid, page_size: usize) -> Self {
        Self {
            user_id,
            page_size,
            items: HashMap::new(),
            deleted: HashSet::new(),
        }
    }

    pub fn reset(&mut self, pulled: Vec<Notification>) {
        let mut items = HashMap::with_capacity(pulled.len());
        for mut notification in pulled {
            if notification.user_id != self.user_id || self.deleted.contains(&notification.id) {
                continue;
            }
            // a pull answered before a mark-read event must not undo it
            if self.items.get(&notification.id).is_some_and(|known| known.read) {
                notification.read = true;
            }
            items.insert(notification.id, notification);
        }
        self.items = items;
    }

    /// Returns whether the event touched this inbox.
    pub fn apply(&mut self, event: &ChangeEvent) -> bool {
        let Row::Notification(notification) = &event.row else {
            return false;
        };
        if notification.user_id != self.user_id {
            return false;
        }

        match event.operation {
            Operation::Insert | Operation::Update => {
                if self.deleted.contains(&notification.id) {
                    return false;
                }
                self.items
                    .entry(notification.id)
                    .and_modify(|existing| {
                        let read = existing.read || notification.read;
                        *existing = notification.clone();
                        existing.read = read;
                    })
                    .or_insert_with(|| notification.clone());
            }
            Operation::Delete => {
                self.deleted.insert(notification.id);
                self.items.remove(&notification.id);
            }
        }
        true
    }

    /// Newest first, capped at the page size.
    pub fn notifications(&self) -> Vec<&Notification> {
        let mut notifications: Vec<&Notification> = self.items.values().collect();
        notifications.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        notifications.truncate(self.page_size);
        notifications
    }

    pub fn unread_count(&self) -> usize {
        self.items.values().filter(|notification| !notification.read).count()
    }
}
