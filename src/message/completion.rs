//! Counted ingress-completion handle.
//!
//! Every party interested in a received transfer (the session itself,
//! durable stores, flow limits holding producer credit) raises a hold
//! on the message's completion. The transfer command is complete once
//! the last hold drops. The final drop fires the stored callback
//! exactly once: synchronously when the session's own `end` releases
//! the last hold on the I/O task, asynchronously from whichever worker
//! thread releases it otherwise.

use parking_lot::Mutex;
use std::sync::Arc;

/// Callback bound to one incomplete transfer command.
pub trait IngressCallback: Send {
    /// Invoked once when `end` finds outstanding holds: the completion
    /// will be asynchronous and the callback decides whether to force a
    /// flush or register the message for a later `execution.sync`.
    fn deferred(&mut self);

    /// Invoked when the last hold drops on a thread other than the
    /// session's I/O task.
    fn completed(self: Box<Self>, success: bool);
}

/// Outcome of releasing the initial hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    /// All holds are gone; the caller owns completion and `success`
    /// reports the aggregate ingress status.
    Completed { success: bool },
    /// Other holders remain; the callback was stored and will fire on
    /// the final `finish`.
    Deferred,
}

#[derive(Default)]
struct CompletionState {
    holds: usize,
    success: bool,
    fired: bool,
    // True while `end` runs the deferred policy outside the lock; a
    // concurrent final `finish` must leave completion to `end`.
    deferring: bool,
    begun: u64,
    released: u64,
    callback: Option<Box<dyn IngressCallback>>,
}

/// Shared completion handle carried by a [`Message`](crate::message::Message).
#[derive(Clone)]
pub struct IngressCompletion {
    inner: Arc<Mutex<CompletionState>>,
}

impl Default for IngressCompletion {
    fn default() -> Self {
        Self::new()
    }
}

impl IngressCompletion {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CompletionState {
                success: true,
                ..CompletionState::default()
            })),
        }
    }

    /// Raise the initial hold before routing begins.
    pub fn begin(&self) {
        let mut state = self.inner.lock();
        state.holds += 1;
        state.begun += 1;
    }

    /// Raise an additional hold on behalf of a downstream party.
    pub fn start(&self) {
        let mut state = self.inner.lock();
        state.holds += 1;
        state.begun += 1;
    }

    /// Release the initial hold, storing `callback` if completion must
    /// wait for other holders.
    pub fn end(&self, mut callback: Box<dyn IngressCallback>) -> EndOutcome {
        {
            let mut state = self.inner.lock();
            debug_assert!(state.holds > 0, "end without matching begin");
            state.holds = state.holds.saturating_sub(1);
            state.released += 1;
            if state.holds == 0 {
                state.fired = true;
                return EndOutcome::Completed {
                    success: state.success,
                };
            }
            state.deferring = true;
        }

        // The deferred policy may flush the message, which can release
        // the remaining holds on this very call stack; it must run
        // without the lock.
        callback.deferred();

        let mut state = self.inner.lock();
        state.deferring = false;
        if state.holds == 0 && !state.fired {
            state.fired = true;
            EndOutcome::Completed {
                success: state.success,
            }
        } else {
            state.callback = Some(callback);
            EndOutcome::Deferred
        }
    }

    /// Release one hold. The final release fires the stored callback on
    /// the current thread; if `end` is mid-defer, completion is left to
    /// it instead.
    pub fn finish(&self, success: bool) {
        let fired = {
            let mut state = self.inner.lock();
            debug_assert!(state.holds > 0, "finish without matching start");
            if !success {
                state.success = false;
            }
            state.holds = state.holds.saturating_sub(1);
            state.released += 1;
            if state.holds == 0 && !state.fired && !state.deferring {
                state.fired = true;
                state.callback.take().map(|cb| (cb, state.success))
            } else {
                None
            }
        };
        if let Some((callback, success)) = fired {
            callback.completed(success);
        }
    }

    /// True once the completion has fired.
    pub fn is_complete(&self) -> bool {
        self.inner.lock().fired
    }

    pub fn outstanding_holds(&self) -> usize {
        self.inner.lock().holds
    }

    /// `(raised, released)` hold counters; equal at teardown.
    pub fn hold_counts(&self) -> (u64, u64) {
        let state = self.inner.lock();
        (state.begun, state.released)
    }
}
