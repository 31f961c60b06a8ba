//! Exchange registry and binding lookup.
//!
//! Routing-table internals are a collaborator of the session pipeline,
//! not its subject: this registry implements direct matching, which is
//! all the pipeline needs to drive messages into queues. The default
//! exchange (the empty name) routes straight to the queue named by the
//! routing key.

use crate::queue::Queue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

struct Binding {
    key: String,
    queue: Arc<Queue>,
}

pub struct Exchange {
    name: String,
    kind: String,
    bindings: RwLock<Vec<Binding>>,
}

impl Exchange {
    fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            bindings: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn bind(&self, queue: Arc<Queue>, key: &str) {
        let mut bindings = self.bindings.write();
        let duplicate = bindings
            .iter()
            .any(|b| b.key == key && b.queue.name() == queue.name());
        if !duplicate {
            bindings.push(Binding {
                key: key.to_string(),
                queue,
            });
        }
    }

    pub fn unbind(&self, queue_name: &str, key: &str) {
        self.bindings
            .write()
            .retain(|b| !(b.key == key && b.queue.name() == queue_name));
    }

    /// Queues bound with exactly this routing key.
    pub fn route(&self, routing_key: &str) -> Vec<Arc<Queue>> {
        self.bindings
            .read()
            .iter()
            .filter(|b| b.key == routing_key)
            .map(|b| b.queue.clone())
            .collect()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.read().len()
    }
}

#[derive(Default)]
pub struct ExchangeRegistry {
    exchanges: RwLock<HashMap<String, Arc<Exchange>>>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&self, name: &str, kind: &str) -> Arc<Exchange> {
        self.exchanges
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Exchange::new(name, kind)))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Exchange>> {
        self.exchanges.read().get(name).cloned()
    }
}
