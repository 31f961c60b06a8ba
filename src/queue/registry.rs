//! Name-to-queue registry.

use crate::queue::factory::QueueFactory;
use crate::queue::queue::Queue;
use crate::queue::settings::{QueueSettings, SettingsError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct QueueRegistry {
    queues: RwLock<HashMap<String, Arc<Queue>>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a queue, creating it on first declare. Redeclaring an
    /// existing queue returns it untouched.
    pub fn declare(
        &self,
        factory: &QueueFactory,
        name: &str,
        settings: QueueSettings,
    ) -> Result<Arc<Queue>, SettingsError> {
        if let Some(existing) = self.queues.read().get(name) {
            return Ok(existing.clone());
        }
        let queue = factory.create(name, settings)?;
        let mut queues = self.queues.write();
        Ok(queues
            .entry(name.to_string())
            .or_insert(queue)
            .clone())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Queue>> {
        self.queues.read().get(name).cloned()
    }

    pub fn delete(&self, name: &str) -> Option<Arc<Queue>> {
        let removed = self.queues.write().remove(name);
        if let Some(queue) = &removed {
            queue.destroyed();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.queues.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.read().is_empty()
    }
}
