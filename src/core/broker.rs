//! Broker assembly.

use crate::core::config::Config;
use crate::core::time::Clock;
use crate::exchange::ExchangeRegistry;
use crate::mgmt::ManagementAgent;
use crate::queue::{FlowDefaults, QueueFactory, QueueRegistry};
use crate::store::MessageStore;
use std::sync::Arc;

/// Process-wide broker state shared by every connection.
pub struct Broker<C: Clock> {
    name: String,
    clock: C,
    timestamping: bool,
    exchanges: ExchangeRegistry,
    queues: QueueRegistry,
    queue_factory: QueueFactory,
    agent: Arc<ManagementAgent>,
}

impl<C: Clock> Broker<C> {
    pub fn new(config: &Config, clock: C, store: Option<Arc<dyn MessageStore>>) -> Arc<Self> {
        let agent = Arc::new(ManagementAgent::new());
        let flow_defaults = FlowDefaults {
            max_size: config.flow.default_max_queue_size,
            stop_ratio: config.flow.stop_ratio,
            resume_ratio: config.flow.resume_ratio,
        };
        let mut queue_factory = QueueFactory::new()
            .with_agent(agent.clone())
            .with_flow_defaults(flow_defaults)
            .with_threshold_event_ratio(config.broker.queue_threshold_event_ratio);
        if let Some(store) = store {
            queue_factory = queue_factory.with_store(store);
        }
        let broker = Self {
            name: config.broker.name.clone(),
            clock,
            timestamping: config.broker.timestamp_messages,
            exchanges: ExchangeRegistry::new(),
            queues: QueueRegistry::new(),
            queue_factory,
            agent,
        };
        tracing::info!(broker = %broker.name, "broker assembled");
        Arc::new(broker)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn is_timestamping(&self) -> bool {
        self.timestamping
    }

    pub fn exchanges(&self) -> &ExchangeRegistry {
        &self.exchanges
    }

    pub fn queues(&self) -> &QueueRegistry {
        &self.queues
    }

    pub fn queue_factory(&self) -> &QueueFactory {
        &self.queue_factory
    }

    pub fn agent(&self) -> &Arc<ManagementAgent> {
        &self.agent
    }
}
