//! Depth threshold alerts.
//!
//! Raises a management event when a queue's depth crosses a
//! ratio-derived threshold on either axis, and another when it drops
//! back below, with the crossing state latched in between so a queue
//! hovering at the boundary does not spam the agent.

use crate::message::QueuedMessage;
use crate::mgmt::ManagementAgent;
use crate::queue::observer::QueueObserver;
use crate::queue::settings::QueueSettings;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct ThresholdState {
    count: u64,
    size: u64,
    crossed: bool,
}

pub struct ThresholdAlerts {
    queue_name: String,
    count_threshold: u64,
    size_threshold: u64,
    agent: Arc<ManagementAgent>,
    state: Mutex<ThresholdState>,
}

impl ThresholdAlerts {
    /// Build the observer, or `None` when the queue declares no maximum
    /// depth to derive thresholds from.
    pub fn from_settings(
        queue_name: &str,
        settings: &QueueSettings,
        event_ratio: f64,
        agent: Arc<ManagementAgent>,
    ) -> Option<Self> {
        if event_ratio <= 0.0 {
            return None;
        }
        let count_threshold = (f64::from(settings.max_count) * event_ratio) as u64;
        let size_threshold = (settings.max_size as f64 * event_ratio) as u64;
        if count_threshold == 0 && size_threshold == 0 {
            return None;
        }
        Some(Self {
            queue_name: queue_name.to_string(),
            count_threshold,
            size_threshold,
            agent,
            state: Mutex::new(ThresholdState::default()),
        })
    }

    fn above(&self, state: &ThresholdState) -> bool {
        (self.count_threshold > 0 && state.count > self.count_threshold)
            || (self.size_threshold > 0 && state.size > self.size_threshold)
    }
}

impl QueueObserver for ThresholdAlerts {
    fn enqueued(&self, entry: &QueuedMessage) {
        let mut state = self.state.lock();
        state.count += 1;
        state.size += entry.message.content_size();
        if !state.crossed && self.above(&state) {
            state.crossed = true;
            self.agent.raise_event(
                &self.queue_name,
                "queueThresholdExceeded",
                format!("count={} size={}", state.count, state.size),
            );
        }
    }

    fn dequeued(&self, entry: &QueuedMessage) {
        let mut state = self.state.lock();
        state.count = state.count.saturating_sub(1);
        state.size = state.size.saturating_sub(entry.message.content_size());
        if state.crossed && !self.above(&state) {
            state.crossed = false;
            self.agent.raise_event(
                &self.queue_name,
                "queueThresholdBelow",
                format!("count={} size={}", state.count, state.size),
            );
        }
    }
}
