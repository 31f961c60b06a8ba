//! Thread-safe bridging of asynchronous command completion.
//!
//! Stores and replicas finish a transfer's ingress from their own
//! threads; only the session's I/O task may touch the session itself.
//! The completer buffers completion records under one lock, wakes the
//! I/O task once per batch, and replays the records into the session in
//! the order they were scheduled. The completer never holds a session
//! reference: the owning I/O task passes the session in when it drains,
//! and `cancel` flips a flag that turns any late work into a no-op.

use crate::core::time::Clock;
use crate::message::{IngressCallback, Message};
use crate::protocol::SequenceNumber;
use crate::session::handler::CompletionWakeup;
use crate::session::state::SessionState;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One asynchronously completed `message.transfer` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedTransfer {
    pub command_id: SequenceNumber,
    pub requires_accept: bool,
    pub requires_sync: bool,
    pub success: bool,
}

#[derive(Default)]
struct CompleterState {
    attached: bool,
    cancelled: bool,
    wakeup: Option<CompletionWakeup>,
    completed: Vec<CompletedTransfer>,
    // Transfers that did not request a sync: held so a later
    // execution.sync can force their flush.
    pending: BTreeMap<u32, Message>,
}

pub struct AsyncCommandCompleter {
    state: Mutex<CompleterState>,
}

impl AsyncCommandCompleter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(CompleterState::default()),
        })
    }

    /// Track a transfer awaiting asynchronous completion.
    pub fn add_pending_message(&self, message: Message) {
        let mut state = self.state.lock();
        let unique = state
            .pending
            .insert(message.command_id().value(), message)
            .is_none();
        debug_assert!(unique, "transfer already tracked as pending");
    }

    /// A tracked transfer completed.
    pub fn delete_pending_message(&self, id: SequenceNumber) {
        self.state.lock().pending.remove(&id.value());
    }

    /// Force every tracked transfer to the store. Runs the flushes
    /// outside the lock.
    pub fn flush_pending_messages(&self) {
        let pending = {
            let mut state = self.state.lock();
            std::mem::take(&mut state.pending)
        };
        for message in pending.into_values() {
            message.flush();
        }
    }

    /// Record a completed transfer. May run on any thread. The first
    /// record of a batch wakes the session's I/O task; records arriving
    /// while detached or cancelled are discarded.
    pub fn schedule_msg_completion(&self, record: CompletedTransfer) {
        let state = &mut *self.state.lock();
        if state.cancelled || !state.attached {
            return;
        }
        state.completed.push(record);
        if state.completed.len() == 1 {
            if let Some(wakeup) = &state.wakeup {
                wakeup.notify();
            }
        }
    }

    /// Drain the batch into the session. Runs on the I/O task that owns
    /// `session`.
    pub fn complete_commands<C: Clock>(&self, session: &mut SessionState<C>) {
        let batch = {
            let mut state = self.state.lock();
            let batch = std::mem::take(&mut state.completed);
            if state.cancelled || !state.attached {
                return;
            }
            batch
        };
        for record in batch {
            session.complete_rcv_msg(
                record.command_id,
                record.requires_accept,
                record.requires_sync,
                record.success,
            );
        }
    }

    /// Completion scheduling is enabled while attached.
    pub fn attached(&self, wakeup: CompletionWakeup) {
        let mut state = self.state.lock();
        state.attached = true;
        state.wakeup = Some(wakeup);
    }

    pub fn detached(&self) {
        let mut state = self.state.lock();
        state.attached = false;
        state.wakeup = None;
    }

    /// Called when the session is destroyed; permanently disables the
    /// completer and drops everything it still buffers.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        state.wakeup = None;
        state.completed.clear();
        state.pending.clear();
    }

    pub fn scheduled_count(&self) -> usize {
        self.state.lock().completed.len()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }
}

/// Callback bound to one incomplete inbound `message.transfer`.
///
/// Created on the content path before routing; if routing leaves holds
/// outstanding the callback is stored on the message's completion and
/// the deferred policy runs: a transfer the peer is waiting on (sync
/// bit) is flushed to the store immediately to avoid a stall, any other
/// is registered with the completer so a later `execution.sync` can
/// force the flush.
pub struct IncompleteIngressTransfer {
    completer: Arc<AsyncCommandCompleter>,
    message: Message,
    command_id: SequenceNumber,
    requires_accept: bool,
    requires_sync: bool,
    pending: bool,
}

impl IncompleteIngressTransfer {
    pub fn new(completer: Arc<AsyncCommandCompleter>, message: &Message) -> Self {
        Self {
            completer,
            command_id: message.command_id(),
            requires_accept: message.requires_accept(),
            requires_sync: message.requires_sync(),
            message: message.clone(),
            pending: false,
        }
    }
}

impl IngressCallback for IncompleteIngressTransfer {
    fn deferred(&mut self) {
        if self.requires_sync {
            self.message.flush();
        } else {
            self.pending = true;
            self.completer.add_pending_message(self.message.clone());
        }
    }

    fn completed(self: Box<Self>, success: bool) {
        if self.pending {
            self.completer.delete_pending_message(self.command_id);
        }
        tracing::debug!(seq = %self.command_id, "async completion scheduled for received transfer");
        self.completer.schedule_msg_completion(CompletedTransfer {
            command_id: self.command_id,
            requires_accept: self.requires_accept,
            requires_sync: self.requires_sync,
            success,
        });
    }
}
