//! Routing entry and delivery bookkeeping for one session.

use crate::core::broker::Broker;
use crate::core::time::Clock;
use crate::message::Message;
use crate::protocol::SequenceSet;

/// The session's semantic layer: resolves where received messages go
/// and tracks what the session has delivered outward.
#[derive(Default)]
pub struct SemanticState {
    output_active: bool,
    /// Commands delivered to the peer and not yet acknowledged.
    unacked: SequenceSet,
}

impl SemanticState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attached(&mut self) {
        self.output_active = true;
    }

    /// Prevents further output until reattached.
    pub fn detached(&mut self) {
        self.output_active = false;
    }

    pub fn output_active(&self) -> bool {
        self.output_active
    }

    /// Route a received message into every matching queue. Returns the
    /// number of queues the message reached; an unroutable message is
    /// dropped.
    pub fn route<C: Clock>(&mut self, broker: &Broker<C>, message: &Message) -> usize {
        let routing_key = message.routing_key();
        let queues = if message.destination().is_empty() {
            // Default exchange: the routing key names the queue.
            broker.queues().get(&routing_key).into_iter().collect()
        } else {
            match broker.exchanges().get(message.destination()) {
                Some(exchange) => exchange.route(&routing_key),
                None => Vec::new(),
            }
        };
        if queues.is_empty() {
            tracing::debug!(
                destination = message.destination(),
                routing_key = %routing_key,
                "message is unroutable; dropping"
            );
            return 0;
        }
        let routed = queues.len();
        for queue in queues {
            queue.enqueue(message.clone());
        }
        routed
    }

    pub fn record_delivery(&mut self, id: crate::protocol::SequenceNumber) {
        self.unacked.add(id);
    }

    /// The peer confirmed this range of deliveries.
    pub fn completed(&mut self, commands: &SequenceSet) {
        for id in commands.iter() {
            self.unacked.remove(id);
        }
    }

    pub fn unacked_count(&self) -> u64 {
        self.unacked.len() as u64
    }
}
