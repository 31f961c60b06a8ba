//! Message distribution to consumers.
//!
//! The distributor picks which message a given consumer receives next:
//! plain FIFO, or group-aware distribution that pins every message of a
//! group to the consumer that owns the group until the group drains.

use crate::message::{Message, QueuedMessage};
use crate::queue::messages::MessageContainer;
use crate::queue::observer::QueueObserver;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributorKind {
    Fifo,
    Group { key: String },
}

pub enum MessageDistributor {
    Fifo,
    Group(Arc<MessageGroupManager>),
}

impl MessageDistributor {
    pub fn next(
        &self,
        container: &mut MessageContainer,
        consumer: &str,
    ) -> Option<QueuedMessage> {
        match self {
            Self::Fifo => container.take_next(),
            Self::Group(manager) => manager.next(container, consumer),
        }
    }
}

#[derive(Debug, Default)]
struct GroupState {
    owner: Option<String>,
    count: u64,
}

/// Tracks group membership and ownership for one queue. Registered as a
/// queue observer so enqueue/dequeue keep the per-group counts current.
pub struct MessageGroupManager {
    key: String,
    groups: Mutex<HashMap<String, GroupState>>,
}

impl MessageGroupManager {
    pub fn new(key: String) -> Arc<Self> {
        Arc::new(Self {
            key,
            groups: Mutex::new(HashMap::new()),
        })
    }

    fn group_of(&self, message: &Message) -> String {
        message.header(&self.key).unwrap_or_default()
    }

    fn next(&self, container: &mut MessageContainer, consumer: &str) -> Option<QueuedMessage> {
        let mut groups = self.groups.lock();
        let taken = container.take_if(|entry| {
            let group = entry
                .message
                .header(&self.key)
                .unwrap_or_default();
            match groups.get(&group).and_then(|g| g.owner.as_deref()) {
                None => true,
                Some(owner) => owner == consumer,
            }
        })?;
        let group = self.group_of(&taken.message);
        let state = groups.entry(group).or_default();
        state.owner = Some(consumer.to_string());
        Some(taken)
    }

    pub fn owner(&self, group: &str) -> Option<String> {
        self.groups.lock().get(group).and_then(|g| g.owner.clone())
    }

    pub fn group_count(&self, group: &str) -> u64 {
        self.groups.lock().get(group).map_or(0, |g| g.count)
    }
}

impl QueueObserver for MessageGroupManager {
    fn enqueued(&self, entry: &QueuedMessage) {
        let group = self.group_of(&entry.message);
        self.groups.lock().entry(group).or_default().count += 1;
    }

    fn dequeued(&self, entry: &QueuedMessage) {
        let group = self.group_of(&entry.message);
        let mut groups = self.groups.lock();
        if let Some(state) = groups.get_mut(&group) {
            state.count = state.count.saturating_sub(1);
            if state.count == 0 {
                // Group drained; the owner is released for rebalancing.
                groups.remove(&group);
            }
        }
    }
}
