//! The queue proper.
//!
//! Behavioral differences between queue kinds are confined to enqueue:
//! a lossy (ring) queue evicts its oldest message instead of growing
//! past its maximum depth, and a last-value queue supersedes an earlier
//! message carrying the same replace-key. Everything else — observers,
//! depth bookkeeping, consumption through the distributor — is shared.

use crate::message::{Message, QueuedMessage};
use crate::mgmt::ManagedQueue;
use crate::protocol::QueueQueryResult;
use crate::queue::distributor::MessageDistributor;
use crate::queue::messages::MessageContainer;
use crate::queue::observer::QueueObserver;
use crate::queue::settings::QueueSettings;
use crate::store::MessageStore;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Base,
    /// Bounded ring: drops the oldest message at overflow.
    Lossy,
    /// Last-value queue keyed by a designated header.
    Lvq,
}

struct QueueState {
    container: MessageContainer,
    next_position: u64,
    count: u64,
    size: u64,
    consumers: u64,
}

pub struct Queue {
    name: String,
    kind: QueueKind,
    settings: QueueSettings,
    store: Option<Arc<dyn MessageStore>>,
    mgmt: Option<Arc<ManagedQueue>>,
    distributor: MessageDistributor,
    state: Mutex<QueueState>,
    observers: Mutex<Vec<Arc<dyn QueueObserver>>>,
}

impl Queue {
    pub(crate) fn new(
        name: &str,
        kind: QueueKind,
        settings: QueueSettings,
        container: MessageContainer,
        distributor: MessageDistributor,
        store: Option<Arc<dyn MessageStore>>,
        mgmt: Option<Arc<ManagedQueue>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            settings,
            store,
            mgmt,
            distributor,
            state: Mutex::new(QueueState {
                container,
                next_position: 0,
                count: 0,
                size: 0,
                consumers: 0,
            }),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn mgmt(&self) -> Option<&Arc<ManagedQueue>> {
        self.mgmt.as_ref()
    }

    pub fn add_observer(&self, observer: Arc<dyn QueueObserver>) {
        self.observers.lock().push(observer);
    }

    fn notify_enqueued(&self, entry: &QueuedMessage) {
        for observer in self.observers.lock().iter() {
            observer.enqueued(entry);
        }
    }

    fn notify_dequeued(&self, entry: &QueuedMessage) {
        for observer in self.observers.lock().iter() {
            observer.dequeued(entry);
        }
    }

    /// Admit a message. Durable queues hand the message to the store
    /// first so the store can defer the transfer's completion until the
    /// write is durable.
    pub fn enqueue(&self, message: Message) {
        if self.settings.durable {
            if let Some(store) = &self.store {
                message.set_store(store.clone());
                store.enqueue(&self.name, &message);
            }
        }

        let mut state = self.state.lock();
        let position = state.next_position;
        state.next_position += 1;
        let entry = QueuedMessage {
            position,
            message: message.clone(),
        };

        if self.kind == QueueKind::Lossy {
            self.evict_for(&mut state, &message);
        }

        let replaced = state.container.push(entry.clone());
        state.count += 1;
        state.size += message.content_size();
        if let Some(replaced) = replaced {
            state.count -= 1;
            state.size = state
                .size
                .saturating_sub(replaced.message.content_size());
            self.notify_dequeued(&replaced);
        }
        self.notify_enqueued(&entry);
    }

    /// Make room for `incoming` on a lossy queue by discarding from the
    /// front.
    fn evict_for(&self, state: &mut QueueState, incoming: &Message) {
        let max_count = u64::from(self.settings.max_count);
        let max_size = self.settings.max_size;
        loop {
            let over_count = max_count > 0 && state.count + 1 > max_count;
            let over_size = max_size > 0 && state.size + incoming.content_size() > max_size;
            if !over_count && !over_size {
                return;
            }
            match state.container.take_next() {
                Some(evicted) => {
                    state.count -= 1;
                    state.size = state
                        .size
                        .saturating_sub(evicted.message.content_size());
                    tracing::debug!(
                        queue = %self.name,
                        position = evicted.position,
                        "ring overflow; discarding oldest message"
                    );
                    self.notify_dequeued(&evicted);
                }
                None => return,
            }
        }
    }

    /// Hand the next message, per the distributor's discipline, to
    /// `consumer`.
    pub fn consume(&self, consumer: &str) -> Option<QueuedMessage> {
        let mut state = self.state.lock();
        let entry = self.distributor.next(&mut state.container, consumer)?;
        state.count -= 1;
        state.size = state.size.saturating_sub(entry.message.content_size());
        self.notify_dequeued(&entry);
        Some(entry)
    }

    /// Discard all queued messages, returning how many were removed.
    pub fn purge(&self) -> usize {
        let mut state = self.state.lock();
        let drained = state.container.drain_all();
        state.count = 0;
        state.size = 0;
        for entry in &drained {
            self.notify_dequeued(entry);
        }
        drained.len()
    }

    pub fn subscribe(&self) {
        self.state.lock().consumers += 1;
    }

    pub fn unsubscribe(&self) {
        let mut state = self.state.lock();
        state.consumers = state.consumers.saturating_sub(1);
    }

    pub fn message_count(&self) -> u64 {
        self.state.lock().count
    }

    pub fn byte_depth(&self) -> u64 {
        self.state.lock().size
    }

    pub fn query(&self) -> QueueQueryResult {
        let state = self.state.lock();
        QueueQueryResult {
            queue: self.name.clone(),
            durable: self.settings.durable,
            message_count: state.count,
            byte_depth: state.size,
            subscriber_count: state.consumers,
        }
    }

    pub(crate) fn destroyed(&self) {
        if let Some(mgmt) = &self.mgmt {
            mgmt.resource_destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MessageProperties, SequenceNumber};
    use crate::queue::messages::ContainerKind;
    use bytes::Bytes;

    fn plain_queue(kind: QueueKind, settings: QueueSettings) -> Queue {
        Queue::new(
            "q",
            kind,
            settings,
            MessageContainer::new(&ContainerKind::Fifo),
            MessageDistributor::Fifo,
            None,
            None,
        )
    }

    fn message(id: u32, size: usize) -> Message {
        Message::new(
            SequenceNumber::new(id),
            String::new(),
            false,
            false,
            MessageProperties::default(),
            Bytes::from(vec![b'x'; size]),
        )
    }

    #[test]
    fn test_enqueue_consume_fifo() {
        let queue = plain_queue(QueueKind::Base, QueueSettings::default());
        queue.enqueue(message(0, 3));
        queue.enqueue(message(1, 3));
        assert_eq!(queue.message_count(), 2);
        assert_eq!(queue.byte_depth(), 6);
        let first = queue.consume("c").unwrap();
        assert_eq!(first.position, 0);
        assert_eq!(queue.message_count(), 1);
    }

    #[test]
    fn test_lossy_queue_drops_oldest_at_count_limit() {
        let settings = QueueSettings {
            drop_messages_at_limit: true,
            max_count: 2,
            ..QueueSettings::default()
        };
        let queue = plain_queue(QueueKind::Lossy, settings);
        for id in 0..4 {
            queue.enqueue(message(id, 1));
        }
        assert_eq!(queue.message_count(), 2);
        // The two oldest were discarded.
        assert_eq!(queue.consume("c").unwrap().position, 2);
        assert_eq!(queue.consume("c").unwrap().position, 3);
    }

    #[test]
    fn test_lossy_queue_honors_size_limit() {
        let settings = QueueSettings {
            drop_messages_at_limit: true,
            max_size: 10,
            ..QueueSettings::default()
        };
        let queue = plain_queue(QueueKind::Lossy, settings);
        queue.enqueue(message(0, 6));
        queue.enqueue(message(1, 6));
        assert_eq!(queue.message_count(), 1);
        assert_eq!(queue.byte_depth(), 6);
    }

    #[test]
    fn test_purge_reports_discard_count() {
        let queue = plain_queue(QueueKind::Base, QueueSettings::default());
        for id in 0..3 {
            queue.enqueue(message(id, 1));
        }
        assert_eq!(queue.purge(), 3);
        assert_eq!(queue.message_count(), 0);
        assert_eq!(queue.byte_depth(), 0);
    }

    #[test]
    fn test_query_reflects_depth_and_subscribers() {
        let queue = plain_queue(QueueKind::Base, QueueSettings::default());
        queue.enqueue(message(0, 4));
        queue.subscribe();
        let result = queue.query();
        assert_eq!(result.message_count, 1);
        assert_eq!(result.byte_depth, 4);
        assert_eq!(result.subscriber_count, 1);
    }
}
