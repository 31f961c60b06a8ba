//! Queue observation hooks.

use crate::message::QueuedMessage;

/// Observer invoked by a queue as messages move through it. Observers
/// run inside the queue lock and must not call back into the queue.
pub trait QueueObserver: Send + Sync {
    fn enqueued(&self, entry: &QueuedMessage);
    fn dequeued(&self, entry: &QueuedMessage);
}
