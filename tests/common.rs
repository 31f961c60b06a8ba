//! Common test harness utilities for integration tests.
//!
//! Provides a frame-collecting session handler, a manually driven
//! message store, and helpers for assembling a broker plus an attached
//! session without a transport.

// Not all test files use all helpers; silence dead_code warnings for unused exports.
#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use stratus::core::broker::Broker;
use stratus::core::config::Config;
use stratus::core::time::SystemClock;
use stratus::message::Message;
use stratus::protocol::{Control, Frame, FrameBody};
use stratus::session::{CompletionWakeup, SessionHandler, SessionId, SessionState};
use stratus::store::MessageStore;
use tokio::sync::mpsc;

/// Shared log of every frame a session emitted.
#[derive(Clone, Default)]
pub struct FrameLog {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl FrameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    /// Only the session-control frames (completions, accepts, results).
    pub fn controls(&self) -> Vec<Control> {
        self.frames
            .lock()
            .iter()
            .filter_map(|frame| match &frame.body {
                FrameBody::Control(control) => Some(control.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }
}

pub struct CollectingHandler {
    log: FrameLog,
    channel: u16,
}

impl CollectingHandler {
    pub fn new(log: FrameLog, channel: u16) -> Self {
        Self { log, channel }
    }
}

impl SessionHandler for CollectingHandler {
    fn out(&mut self, frame: Frame) {
        self.log.frames.lock().push(frame);
    }

    fn channel(&self) -> u16 {
        self.channel
    }

    fn connection_id(&self) -> &str {
        "test-connection"
    }
}

/// Store that holds every enqueued message until the test completes it,
/// standing in for a slow durable store worker.
#[derive(Default)]
pub struct TestStore {
    held: Mutex<Vec<Message>>,
    flushed: Mutex<Vec<u32>>,
}

impl TestStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Finish the oldest held write from "a worker thread".
    pub fn complete_next(&self, success: bool) {
        let message = {
            let mut held = self.held.lock();
            if held.is_empty() {
                return;
            }
            held.remove(0)
        };
        message.ingress().finish(success);
    }

    pub fn complete_all(&self, success: bool) {
        let drained: Vec<Message> = std::mem::take(&mut *self.held.lock());
        for message in drained {
            message.ingress().finish(success);
        }
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    /// Command ids `flush` was called for.
    pub fn flushed_ids(&self) -> Vec<u32> {
        self.flushed.lock().clone()
    }
}

impl MessageStore for TestStore {
    fn enqueue(&self, _queue: &str, message: &Message) {
        message.ingress().start();
        self.held.lock().push(message.clone());
    }

    fn flush(&self, message: &Message) {
        self.flushed.lock().push(message.command_id().value());
        let held = {
            let mut held = self.held.lock();
            held.iter()
                .position(|m| m.command_id() == message.command_id())
                .map(|pos| held.remove(pos))
        };
        if let Some(message) = held {
            message.ingress().finish(true);
        }
    }
}

pub fn timestamping_config() -> Config {
    let mut config = Config::default();
    config.broker.timestamp_messages = true;
    config
}

pub fn broker_with_store(store: Arc<TestStore>) -> Arc<Broker<SystemClock>> {
    Broker::new(
        &Config::default(),
        SystemClock,
        Some(store as Arc<dyn MessageStore>),
    )
}

pub fn broker() -> Arc<Broker<SystemClock>> {
    Broker::new(&Config::default(), SystemClock, None)
}

pub struct TestSession {
    pub session: SessionState<SystemClock>,
    pub log: FrameLog,
    pub wakeups: mpsc::UnboundedReceiver<()>,
}

impl TestSession {
    /// Drain any queued completion wakeups the way the connection's I/O
    /// loop would.
    pub fn drain_completions(&mut self) {
        while self.wakeups.try_recv().is_ok() {
            self.session.process_completions();
        }
    }
}

pub fn attach_session(broker: &Arc<Broker<SystemClock>>, name: &str) -> TestSession {
    let log = FrameLog::new();
    let (wakeup, wakeups) = CompletionWakeup::channel();
    let session = SessionState::new(
        broker.clone(),
        SessionId::new(name),
        Box::new(CollectingHandler::new(log.clone(), 1)),
        wakeup,
        4096,
    );
    TestSession {
        session,
        log,
        wakeups,
    }
}

pub fn declare_arguments(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
