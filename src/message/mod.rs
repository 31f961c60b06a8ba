//! The broker-side message value.
//!
//! A `Message` is assembled from one transfer frameset and then shared
//! by reference between the session, the queues it was routed to, the
//! store and any flow limits holding producer credit. Cloning is cheap;
//! all clones share the one ingress-completion handle.

pub mod completion;

pub use completion::{EndOutcome, IngressCallback, IngressCompletion};

use crate::protocol::{MessageProperties, SequenceNumber};
use crate::store::MessageStore;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;

struct MessageInner {
    command_id: SequenceNumber,
    destination: String,
    requires_accept: bool,
    requires_sync: bool,
    properties: Mutex<MessageProperties>,
    content: Bytes,
    publisher: Mutex<Option<String>>,
    store: Mutex<Option<Arc<dyn MessageStore>>>,
    ingress: IngressCompletion,
}

#[derive(Clone)]
pub struct Message {
    inner: Arc<MessageInner>,
}

impl Message {
    pub fn new(
        command_id: SequenceNumber,
        destination: String,
        requires_accept: bool,
        requires_sync: bool,
        properties: MessageProperties,
        content: Bytes,
    ) -> Self {
        Self {
            inner: Arc::new(MessageInner {
                command_id,
                destination,
                requires_accept,
                requires_sync,
                properties: Mutex::new(properties),
                content,
                publisher: Mutex::new(None),
                store: Mutex::new(None),
                ingress: IngressCompletion::new(),
            }),
        }
    }

    pub fn command_id(&self) -> SequenceNumber {
        self.inner.command_id
    }

    /// Exchange the transfer was published to; empty selects the
    /// default exchange.
    pub fn destination(&self) -> &str {
        &self.inner.destination
    }

    pub fn requires_accept(&self) -> bool {
        self.inner.requires_accept
    }

    pub fn requires_sync(&self) -> bool {
        self.inner.requires_sync
    }

    pub fn routing_key(&self) -> String {
        self.inner.properties.lock().routing_key.clone()
    }

    pub fn priority(&self) -> u8 {
        self.inner.properties.lock().priority
    }

    pub fn durable(&self) -> bool {
        self.inner.properties.lock().durable
    }

    pub fn content_size(&self) -> u64 {
        self.inner.content.len() as u64
    }

    pub fn content(&self) -> &Bytes {
        &self.inner.content
    }

    pub fn properties(&self) -> MessageProperties {
        self.inner.properties.lock().clone()
    }

    /// Value of an application header, as used by LVQ replace keys and
    /// message-group keys.
    pub fn header(&self, key: &str) -> Option<String> {
        self.inner.properties.lock().headers.get(key).cloned()
    }

    pub fn set_timestamp(&self, seconds: u64) {
        self.inner.properties.lock().timestamp = Some(seconds);
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.inner.properties.lock().timestamp
    }

    pub fn set_publisher(&self, connection: &str) {
        *self.inner.publisher.lock() = Some(connection.to_string());
    }

    pub fn publisher(&self) -> Option<String> {
        self.inner.publisher.lock().clone()
    }

    /// Bind the store that accepted this message for persistence, so a
    /// later flush can be routed to it.
    pub fn set_store(&self, store: Arc<dyn MessageStore>) {
        *self.inner.store.lock() = Some(store);
    }

    /// Force an immediate persistence write for a transfer the peer is
    /// waiting on. A no-op for transient messages.
    pub fn flush(&self) {
        let store = self.inner.store.lock().clone();
        if let Some(store) = store {
            store.flush(self);
        }
    }

    pub fn ingress(&self) -> &IngressCompletion {
        &self.inner.ingress
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("command_id", &self.inner.command_id)
            .field("destination", &self.inner.destination)
            .field("size", &self.inner.content.len())
            .finish()
    }
}

/// A message together with its position on one particular queue.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub position: u64,
    pub message: Message,
}
