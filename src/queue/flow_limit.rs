//! Producer flow control.
//!
//! Raises an `active` flag when the queue's depth crosses a stop
//! threshold on either axis (message count or byte size) and lowers it
//! only once the depth has dropped below both resume thresholds. While
//! active, each enqueued message keeps a hold on its ingress completion
//! so the publisher's credit stalls instead of messages being dropped;
//! the holds are released when flow resumes.

use crate::message::QueuedMessage;
use crate::mgmt::ManagedQueue;
use crate::queue::observer::QueueObserver;
use crate::queue::settings::QueueSettings;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Broker-wide defaults used to derive per-queue thresholds when a
/// queue declares none of its own.
#[derive(Debug, Clone, Copy)]
pub struct FlowDefaults {
    /// Default maximum queue size in bytes.
    pub max_size: u64,
    /// Percentage of the maximum at which flow stops.
    pub stop_ratio: u8,
    /// Percentage of the maximum at which flow resumes.
    pub resume_ratio: u8,
}

impl Default for FlowDefaults {
    fn default() -> Self {
        Self {
            max_size: 100 * 1024 * 1024,
            stop_ratio: 80,
            resume_ratio: 70,
        }
    }
}

#[derive(Debug, Default)]
struct FlowState {
    count: u32,
    size: u64,
    active: bool,
    // Messages holding producer credit, keyed by queue position.
    held: BTreeMap<u64, QueuedMessage>,
}

pub struct QueueFlowLimit {
    queue_name: String,
    stop_count: u32,
    resume_count: u32,
    stop_size: u64,
    resume_size: u64,
    mgmt: Option<Arc<ManagedQueue>>,
    state: Mutex<FlowState>,
}

impl QueueFlowLimit {
    pub fn new(
        queue_name: &str,
        stop_count: u32,
        resume_count: u32,
        stop_size: u64,
        resume_size: u64,
        mgmt: Option<Arc<ManagedQueue>>,
    ) -> Self {
        // A lone stop value behaves as stop==resume.
        let resume_count = if stop_count > 0 && resume_count == 0 {
            stop_count
        } else {
            resume_count
        };
        let resume_size = if stop_size > 0 && resume_size == 0 {
            stop_size
        } else {
            resume_size
        };
        debug_assert!(resume_count <= stop_count || stop_count == 0);
        debug_assert!(resume_size <= stop_size || stop_size == 0);
        tracing::info!(
            queue = queue_name,
            stop_count,
            resume_count,
            stop_size,
            resume_size,
            "flow limit created"
        );
        Self {
            queue_name: queue_name.to_string(),
            stop_count,
            resume_count,
            stop_size,
            resume_size,
            mgmt,
            state: Mutex::new(FlowState::default()),
        }
    }

    /// Build a limit for a queue, or `None` when flow control does not
    /// apply. Explicit per-queue settings take precedence; otherwise
    /// thresholds are derived from the broker defaults. Ring queues
    /// never get a limit: their depth is bounded by design.
    pub fn from_settings(
        queue_name: &str,
        settings: &QueueSettings,
        defaults: &FlowDefaults,
        mgmt: Option<Arc<ManagedQueue>>,
    ) -> Option<Self> {
        if settings.drop_messages_at_limit {
            return None;
        }
        if settings.flow_explicit {
            if settings.flow_stop_count > 0 || settings.flow_stop_size > 0 {
                return Some(Self::new(
                    queue_name,
                    settings.flow_stop_count,
                    settings.flow_resume_count,
                    settings.flow_stop_size,
                    settings.flow_resume_size,
                    mgmt,
                ));
            }
            // Explicitly configured to zero: flow control is off.
            return None;
        }
        if defaults.stop_ratio == 0 {
            return None;
        }
        let max_size = if settings.max_size > 0 {
            settings.max_size
        } else {
            defaults.max_size
        };
        let stop_size = ratio_of(max_size, defaults.stop_ratio, true);
        let resume_size = ratio_of(max_size, defaults.resume_ratio, false);
        let max_count = u64::from(settings.max_count);
        let stop_count = ratio_of(max_count, defaults.stop_ratio, true) as u32;
        let resume_count = ratio_of(max_count, defaults.resume_ratio, false) as u32;
        Some(Self::new(
            queue_name,
            stop_count,
            resume_count,
            stop_size,
            resume_size,
            mgmt,
        ))
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn depth(&self) -> (u32, u64) {
        let state = self.state.lock();
        (state.count, state.size)
    }

    pub fn stop_count(&self) -> u32 {
        self.stop_count
    }

    pub fn resume_count(&self) -> u32 {
        self.resume_count
    }

    pub fn stop_size(&self) -> u64 {
        self.stop_size
    }

    pub fn resume_size(&self) -> u64 {
        self.resume_size
    }

    fn release(held: Vec<QueuedMessage>) {
        for entry in held {
            entry.message.ingress().finish(true);
        }
    }
}

impl QueueObserver for QueueFlowLimit {
    fn enqueued(&self, entry: &QueuedMessage) {
        let mut state = self.state.lock();
        state.count += 1;
        state.size += entry.message.content_size();

        if !state.active {
            if self.stop_count > 0 && state.count > self.stop_count {
                state.active = true;
                tracing::info!(
                    queue = %self.queue_name,
                    count = state.count,
                    "queue reached its stop count; producer flow control activated"
                );
            } else if self.stop_size > 0 && state.size > self.stop_size {
                state.active = true;
                tracing::info!(
                    queue = %self.queue_name,
                    size = state.size,
                    "queue reached its stop size; producer flow control activated"
                );
            }
            if state.active {
                if let Some(mgmt) = &self.mgmt {
                    mgmt.set_flow_stopped(true);
                }
            }
        }

        if state.active || !state.held.is_empty() {
            // Completion stalls until flow resumes.
            entry.message.ingress().start();
            let unique = state.held.insert(entry.position, entry.clone()).is_none();
            debug_assert!(unique, "duplicate position in flow index");
        }
    }

    fn dequeued(&self, entry: &QueuedMessage) {
        let released = {
            let mut state = self.state.lock();
            debug_assert!(state.count > 0, "flow limit count underflow");
            state.count = state.count.saturating_sub(1);
            let size = entry.message.content_size();
            debug_assert!(state.size >= size, "flow limit size underflow");
            state.size = state.size.saturating_sub(size);

            if state.active
                && (self.resume_size == 0 || state.size < self.resume_size)
                && (self.resume_count == 0 || state.count < self.resume_count)
            {
                state.active = false;
                if let Some(mgmt) = &self.mgmt {
                    mgmt.set_flow_stopped(false);
                }
                tracing::info!(
                    queue = %self.queue_name,
                    "queue drained below its resume level; producer flow control deactivated"
                );
            }

            if state.held.is_empty() {
                Vec::new()
            } else if !state.active {
                let held = std::mem::take(&mut state.held);
                held.into_values().collect()
            } else {
                // Still flow-controlled, but this message left the
                // queue; its own hold must not outlive it.
                state
                    .held
                    .remove(&entry.position)
                    .map(|held| vec![held])
                    .unwrap_or_default()
            }
        };
        Self::release(released);
    }
}

impl Drop for QueueFlowLimit {
    fn drop(&mut self) {
        let held = std::mem::take(&mut self.state.lock().held);
        Self::release(held.into_values().collect());
    }
}

/// Percentage of `max`, rounding half-up at the stop boundary and
/// truncating at the resume boundary.
fn ratio_of(max: u64, ratio: u8, round_up: bool) -> u64 {
    let scaled = max as f64 * (f64::from(ratio) / 100.0);
    if round_up {
        (scaled + 0.5) as u64
    } else {
        scaled as u64
    }
}
