//! Queue construction.
//!
//! Construction is strictly ordered: validate the settings, pick the
//! queue kind, pick the message container, pick the distributor, then
//! attach observers. A validation failure aborts the whole create, so a
//! half-built queue never escapes.

use crate::mgmt::ManagementAgent;
use crate::queue::distributor::{MessageDistributor, MessageGroupManager};
use crate::queue::flow_limit::{FlowDefaults, QueueFlowLimit};
use crate::queue::messages::{ContainerKind, MessageContainer, DEFAULT_FAIRSHARE_CREDIT};
use crate::queue::queue::{Queue, QueueKind};
use crate::queue::settings::{QueueSettings, SettingsError};
use crate::queue::threshold::ThresholdAlerts;
use crate::store::MessageStore;
use std::sync::Arc;

/// Broker-side context the factory draws on.
#[derive(Clone)]
pub struct QueueFactory {
    store: Option<Arc<dyn MessageStore>>,
    agent: Option<Arc<ManagementAgent>>,
    flow_defaults: FlowDefaults,
    threshold_event_ratio: f64,
}

impl Default for QueueFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueFactory {
    pub fn new() -> Self {
        Self {
            store: None,
            agent: None,
            flow_defaults: FlowDefaults::default(),
            threshold_event_ratio: 0.8,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_agent(mut self, agent: Arc<ManagementAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_flow_defaults(mut self, defaults: FlowDefaults) -> Self {
        self.flow_defaults = defaults;
        self
    }

    pub fn with_threshold_event_ratio(mut self, ratio: f64) -> Self {
        self.threshold_event_ratio = ratio;
        self
    }

    pub fn create(
        &self,
        name: &str,
        settings: QueueSettings,
    ) -> Result<Arc<Queue>, SettingsError> {
        settings.validate()?;

        // 1. queue kind
        let kind = if settings.drop_messages_at_limit {
            QueueKind::Lossy
        } else if settings.has_lvq_key() {
            QueueKind::Lvq
        } else {
            QueueKind::Base
        };

        // 2. message container
        let container_kind = if settings.priorities > 0 {
            let fairshare = if settings.fairshare_enabled() {
                Some(if settings.fairshare.is_empty() {
                    vec![DEFAULT_FAIRSHARE_CREDIT; settings.priorities as usize]
                } else {
                    settings.fairshare.clone()
                })
            } else {
                None
            };
            ContainerKind::Priority {
                levels: settings.priorities,
                fairshare,
            }
        } else if settings.has_lvq_key() {
            ContainerKind::Lvq {
                key: settings.lvq_key.clone(),
            }
        } else {
            ContainerKind::Fifo
        };
        let container = MessageContainer::new(&container_kind);

        // 3. distributor
        let group_manager = if settings.has_group_key() {
            Some(MessageGroupManager::new(settings.group_key.clone()))
        } else {
            None
        };
        let distributor = match &group_manager {
            Some(manager) => MessageDistributor::Group(manager.clone()),
            None => MessageDistributor::Fifo,
        };

        let store = if settings.durable {
            self.store.clone()
        } else {
            None
        };
        let mgmt = self.agent.as_ref().map(|agent| agent.register_queue(name));
        let queue = Arc::new(Queue::new(
            name,
            kind,
            settings.clone(),
            container,
            distributor,
            store,
            mgmt.clone(),
        ));

        if let Some(manager) = group_manager {
            queue.add_observer(manager);
        }

        // 4. threshold events
        if let Some(agent) = &self.agent {
            if let Some(alerts) = ThresholdAlerts::from_settings(
                name,
                &settings,
                self.threshold_event_ratio,
                agent.clone(),
            ) {
                queue.add_observer(Arc::new(alerts));
            }
        }

        // 5. flow control
        if let Some(limit) =
            QueueFlowLimit::from_settings(name, &settings, &self.flow_defaults, mgmt)
        {
            queue.add_observer(Arc::new(limit));
        }

        Ok(queue)
    }
}
