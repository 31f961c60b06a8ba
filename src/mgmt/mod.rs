//! Management substrate.
//!
//! Sessions and queues register a management object with the agent on
//! construction and mark it destroyed when they go away; the agent owns
//! the objects independently, so a destroyed resource can still appear
//! in a pending report. Transport of management data is out of scope —
//! the agent exposes snapshots and raises events through tracing.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Status of a management method invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodStatus {
    Ok,
    NotImplemented,
    UnknownMethod,
    Forbidden,
}

/// Management methods addressable on a session object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMethod {
    Detach,
    Close,
    SolicitAck,
    ResetLifespan,
}

impl SessionMethod {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "detach" => Some(Self::Detach),
            "close" => Some(Self::Close),
            "solicit-ack" => Some(Self::SolicitAck),
            "reset-lifespan" => Some(Self::ResetLifespan),
            _ => None,
        }
    }
}

/// Management methods addressable on a routing exchange. The routing
/// engine behind them lives outside this crate, so the broker only
/// recognizes the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeMethod {
    AddLink,
    DelLink,
    GetRouterData,
}

impl ExchangeMethod {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "add_link" => Some(Self::AddLink),
            "del_link" => Some(Self::DelLink),
            "get_router_data" => Some(Self::GetRouterData),
            _ => None,
        }
    }

    /// Dispatch against a broker without a routing engine attached.
    pub fn dispatch(self, authorized: bool) -> MethodStatus {
        if !authorized {
            return MethodStatus::Forbidden;
        }
        MethodStatus::NotImplemented
    }
}

/// Event raised by a managed resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementEvent {
    pub resource: String,
    pub name: String,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct ManagedSession {
    name: String,
    attached: AtomicBool,
    unacked_messages: AtomicU64,
    destroyed: AtomicBool,
}

impl ManagedSession {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::Relaxed);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Relaxed)
    }

    pub fn set_unacked_messages(&self, count: u64) {
        self.unacked_messages.store(count, Ordering::Relaxed);
    }

    pub fn unacked_messages(&self) -> u64 {
        self.unacked_messages.load(Ordering::Relaxed)
    }

    pub fn resource_destroy(&self) {
        self.destroyed.store(true, Ordering::Relaxed);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct ManagedQueue {
    name: String,
    flow_stopped: AtomicBool,
    flow_stopped_count: AtomicU64,
    destroyed: AtomicBool,
}

impl ManagedQueue {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_flow_stopped(&self, stopped: bool) {
        self.flow_stopped.store(stopped, Ordering::Relaxed);
        if stopped {
            self.flow_stopped_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn is_flow_stopped(&self) -> bool {
        self.flow_stopped.load(Ordering::Relaxed)
    }

    pub fn flow_stopped_count(&self) -> u64 {
        self.flow_stopped_count.load(Ordering::Relaxed)
    }

    pub fn resource_destroy(&self) {
        self.destroyed.store(true, Ordering::Relaxed);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct AgentState {
    sessions: HashMap<String, Arc<ManagedSession>>,
    queues: HashMap<String, Arc<ManagedQueue>>,
    events: Vec<ManagementEvent>,
}

/// Process-wide management agent.
#[derive(Default)]
pub struct ManagementAgent {
    state: Mutex<AgentState>,
    events_raised: AtomicU64,
}

impl ManagementAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_session(&self, name: &str) -> Arc<ManagedSession> {
        let object = Arc::new(ManagedSession {
            name: name.to_string(),
            ..ManagedSession::default()
        });
        self.state
            .lock()
            .sessions
            .insert(name.to_string(), object.clone());
        object
    }

    pub fn register_queue(&self, name: &str) -> Arc<ManagedQueue> {
        let object = Arc::new(ManagedQueue {
            name: name.to_string(),
            ..ManagedQueue::default()
        });
        self.state
            .lock()
            .queues
            .insert(name.to_string(), object.clone());
        object
    }

    pub fn session(&self, name: &str) -> Option<Arc<ManagedSession>> {
        self.state.lock().sessions.get(name).cloned()
    }

    pub fn queue(&self, name: &str) -> Option<Arc<ManagedQueue>> {
        self.state.lock().queues.get(name).cloned()
    }

    pub fn raise_event(&self, resource: &str, name: &str, detail: String) {
        self.events_raised.fetch_add(1, Ordering::Relaxed);
        tracing::event!(
            tracing::Level::INFO,
            resource,
            event = name,
            detail = %detail,
            "management event"
        );
        self.state.lock().events.push(ManagementEvent {
            resource: resource.to_string(),
            name: name.to_string(),
            detail,
        });
    }

    pub fn events_raised(&self) -> u64 {
        self.events_raised.load(Ordering::Relaxed)
    }

    pub fn drain_events(&self) -> Vec<ManagementEvent> {
        std::mem::take(&mut self.state.lock().events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_object_outlives_destroy() {
        let agent = ManagementAgent::new();
        let object = agent.register_session("s1");
        object.set_attached(true);
        object.resource_destroy();
        // The agent still owns the object for pending reports.
        let held = agent.session("s1").unwrap();
        assert!(held.is_destroyed());
        assert!(held.is_attached());
    }

    #[test]
    fn test_events_are_counted_and_drained() {
        let agent = ManagementAgent::new();
        agent.raise_event("q1", "queueThresholdExceeded", "depth=10".into());
        assert_eq!(agent.events_raised(), 1);
        let events = agent.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "queueThresholdExceeded");
        assert!(agent.drain_events().is_empty());
    }

    #[test]
    fn test_session_method_parse() {
        assert_eq!(SessionMethod::parse("detach"), Some(SessionMethod::Detach));
        assert_eq!(
            SessionMethod::parse("reset-lifespan"),
            Some(SessionMethod::ResetLifespan)
        );
        assert_eq!(SessionMethod::parse("nope"), None);
    }

    #[test]
    fn test_exchange_methods_without_a_routing_engine() {
        assert_eq!(
            ExchangeMethod::parse("add_link"),
            Some(ExchangeMethod::AddLink)
        );
        assert_eq!(
            ExchangeMethod::AddLink.dispatch(false),
            MethodStatus::Forbidden
        );
        assert_eq!(
            ExchangeMethod::GetRouterData.dispatch(true),
            MethodStatus::NotImplemented
        );
    }
}
