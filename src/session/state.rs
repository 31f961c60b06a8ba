//! Broker-side session state: the inbound command pipeline.
//!
//! One session ingests framed commands from its connection's I/O task,
//! assigns each a serial command id, and drives it down one of two
//! paths: content-bearing transfers are assembled and routed, with
//! completion possibly deferred until every interested party releases
//! its hold; every other method is dispatched synchronously through the
//! invoker. Completion and accept bookkeeping is flushed back to the
//! peer as `execution.completed` / `message.accept` frames.
//!
//! The session is the sole mutator of its sequence bookkeeping and is
//! only ever touched from the I/O task that owns it; asynchronous
//! completions reach it through the [`AsyncCommandCompleter`].

use crate::core::broker::Broker;
use crate::core::time::Clock;
use crate::message::EndOutcome;
use crate::mgmt::{ManagedSession, MethodStatus, SessionMethod};
use crate::protocol::{
    Control, Frame, FrameBody, MessageProperties, SequenceNumber, SequenceSet,
};
use crate::session::builder::MessageBuilder;
use crate::session::completer::{AsyncCommandCompleter, IncompleteIngressTransfer};
use crate::session::error::SessionError;
use crate::session::handler::{CompletionWakeup, SessionHandler};
use crate::session::invoker::{self, Invocation};
use crate::session::semantic::SemanticState;
use bytes::Bytes;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identity of a session within the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId {
    name: String,
    uuid: Uuid,
}

impl SessionId {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            uuid: Uuid::new_v4(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.uuid)
    }
}

struct ReplayEntry {
    command_id: SequenceNumber,
    frames: Vec<Frame>,
}

pub struct SessionState<C: Clock> {
    id: SessionId,
    broker: Arc<Broker<C>>,
    handler: Option<Box<dyn SessionHandler>>,
    semantic: SemanticState,
    builder: MessageBuilder,
    completer: Arc<AsyncCommandCompleter>,
    mgmt: Arc<ManagedSession>,
    detach_timeout_seconds: u32,
    replay_hard_limit: usize,

    // Receive direction.
    next_receive: SequenceNumber,
    current_command: SequenceNumber,
    current_command_complete: bool,
    incomplete: SequenceSet,
    completed: SequenceSet,
    accepted: SequenceSet,
    rejected: SequenceSet,
    pending_execution_syncs: VecDeque<SequenceNumber>,

    // Send direction.
    next_send: SequenceNumber,
    replay: VecDeque<ReplayEntry>,
}

impl<C: Clock> SessionState<C> {
    pub fn new(
        broker: Arc<Broker<C>>,
        id: SessionId,
        handler: Box<dyn SessionHandler>,
        wakeup: CompletionWakeup,
        replay_hard_limit: usize,
    ) -> Self {
        let mgmt = broker.agent().register_session(id.name());
        let mut session = Self {
            id,
            broker,
            handler: None,
            semantic: SemanticState::new(),
            builder: MessageBuilder::new(),
            completer: AsyncCommandCompleter::new(),
            mgmt,
            detach_timeout_seconds: 0,
            replay_hard_limit,
            next_receive: SequenceNumber::default(),
            current_command: SequenceNumber::default(),
            current_command_complete: true,
            incomplete: SequenceSet::new(),
            completed: SequenceSet::new(),
            accepted: SequenceSet::new(),
            rejected: SequenceSet::new(),
            pending_execution_syncs: VecDeque::new(),
            next_send: SequenceNumber::default(),
            replay: VecDeque::new(),
        };
        session.attach(handler, wakeup);
        session
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn broker(&self) -> &Arc<Broker<C>> {
        &self.broker
    }

    pub fn completer(&self) -> &Arc<AsyncCommandCompleter> {
        &self.completer
    }

    pub fn mgmt(&self) -> &Arc<ManagedSession> {
        &self.mgmt
    }

    pub fn is_attached(&self) -> bool {
        self.handler.is_some()
    }

    /// Session resume is not implemented, so the timeout is recorded
    /// but otherwise inert.
    pub fn set_timeout(&mut self, seconds: u32) {
        self.detach_timeout_seconds = seconds;
    }

    pub fn timeout(&self) -> u32 {
        self.detach_timeout_seconds
    }

    pub fn attach(&mut self, handler: Box<dyn SessionHandler>, wakeup: CompletionWakeup) {
        tracing::debug!(session = %self.id, "attached on broker");
        self.handler = Some(handler);
        self.mgmt.set_attached(true);
        self.semantic.attached();
        self.completer.attached(wakeup);
    }

    pub fn detach(&mut self) {
        tracing::debug!(session = %self.id, "detached on broker");
        self.completer.detached();
        self.disable_output();
        self.handler = None;
        self.mgmt.set_attached(false);
    }

    fn disable_output(&mut self) {
        self.semantic.detached();
    }

    // -------------------------------------------------------------------
    // Inbound pipeline
    // -------------------------------------------------------------------

    pub fn handle_in(&mut self, frame: Frame) -> Result<(), SessionError> {
        if frame.starts_command() {
            self.current_command = self.next_receive.advance();
            self.incomplete.add(self.current_command);
        }
        let id = self.current_command;
        let content_path = match frame.method_body() {
            None => true,
            Some(method) => method.is_content_bearing(),
        };
        if content_path {
            self.handle_content(frame, id)
        } else if frame.bof && frame.eof {
            self.handle_command(frame, id)
        } else {
            Err(SessionError::InternalError(
                "cannot handle multi-frame command segments".into(),
            ))
        }
    }

    /// Forward an outbound frame to the peer.
    pub fn handle_out(&mut self, frame: Frame) -> Result<(), SessionError> {
        self.send_frame(frame)
    }

    fn handle_command(&mut self, frame: Frame, id: SequenceNumber) -> Result<(), SessionError> {
        let sync = frame.method_is_sync();
        let FrameBody::Method { method, .. } = frame.body else {
            unreachable!("command path requires a method frame");
        };
        // Assumed complete; the invoked method may override.
        self.current_command_complete = true;
        let invocation = match invoker::invoke(self, &method) {
            Ok(invocation) => invocation,
            Err(err) => {
                // A failed command still occupies its slot in the
                // sequence.
                self.receiver_completed(id);
                return Err(err);
            }
        };
        if self.current_command_complete {
            self.receiver_completed(id);
        }
        match invocation {
            Invocation::NotHandled => {
                return Err(SessionError::NotImplemented(method.name().to_string()));
            }
            Invocation::Handled => {}
            Invocation::Result(value) => {
                self.send_frame(Frame::control(Control::ExecutionResult {
                    command_id: id,
                    value,
                }))?;
            }
        }
        if sync && self.current_command_complete {
            self.send_accept_and_completion()?;
        }
        Ok(())
    }

    fn handle_content(&mut self, frame: Frame, id: SequenceNumber) -> Result<(), SessionError> {
        if frame.starts_command() {
            self.builder.start(id);
        }
        let headerless = frame.bof;
        let ends = frame.ends_frameset();
        if let Err(err) = self.builder.handle(&frame) {
            self.builder.abort();
            return Err(err);
        }
        if !ends {
            return Ok(());
        }

        let message = self.builder.end(headerless)?;
        if self.broker.is_timestamping() {
            message.set_timestamp(self.broker.clock().wall_seconds());
        }
        if let Some(handler) = &self.handler {
            message.set_publisher(handler.connection_id());
        }

        let transfer = IncompleteIngressTransfer::new(self.completer.clone(), &message);
        message.ingress().begin();
        self.semantic.route(&self.broker, &message);
        if let EndOutcome::Completed { success } = message.ingress().end(Box::new(transfer)) {
            // Every other holder already released; completion runs
            // right here on the I/O task.
            if self.is_attached() {
                tracing::debug!(session = %self.id, seq = %id, "receive completed for transfer");
                self.complete_rcv_msg(
                    id,
                    message.requires_accept(),
                    message.requires_sync(),
                    success,
                );
            }
        }
        Ok(())
    }

    /// Current received command is an `execution.sync`. Complete it
    /// only once all preceding commands have completed.
    pub(crate) fn add_pending_execution_sync(&mut self) {
        let sync_id = self.current_command;
        let earlier_pending = self
            .incomplete
            .first()
            .is_some_and(|front| front < sync_id);
        if earlier_pending {
            self.current_command_complete = false;
            self.pending_execution_syncs.push_back(sync_id);
            self.completer.flush_pending_messages();
            tracing::debug!(session = %self.id, sync = %sync_id, "delaying completion of execution.sync");
        }
    }

    // -------------------------------------------------------------------
    // Completion bookkeeping
    // -------------------------------------------------------------------

    fn receiver_completed(&mut self, id: SequenceNumber) {
        debug_assert!(
            id < self.next_receive,
            "completing a command id never received"
        );
        self.incomplete.remove(id);
        self.completed.add(id);
    }

    /// The given inbound transfer has been fully processed by every
    /// interested party; fold it into the session's completion state
    /// and drain any `execution.sync` barriers it unblocks.
    pub(crate) fn complete_rcv_msg(
        &mut self,
        id: SequenceNumber,
        requires_accept: bool,
        requires_sync: bool,
        success: bool,
    ) {
        if !self.is_attached() {
            return;
        }
        let mut call_send_completion = false;
        self.receiver_completed(id);
        if success {
            if requires_accept {
                // Surfaces in the next message.accept we send.
                self.accepted.add(id);
            }
        } else {
            // The command still completes, but a failed ingress is
            // never reported accepted.
            self.rejected.add(id);
            tracing::warn!(session = %self.id, seq = %id, "ingress failed for transfer; recording as rejected");
        }

        while let Some(&sync_id) = self.pending_execution_syncs.front() {
            let earlier_pending = self
                .incomplete
                .first()
                .is_some_and(|front| front < sync_id);
            if earlier_pending {
                break;
            }
            self.pending_execution_syncs.pop_front();
            tracing::debug!(session = %self.id, sync = %sync_id, "delayed execution.sync is completed");
            self.receiver_completed(sync_id);
            call_send_completion = true;
        }

        if requires_sync || call_send_completion {
            if let Err(err) = self.send_accept_and_completion() {
                tracing::error!(session = %self.id, %err, "failed to flush completion state");
            }
        }
    }

    /// Drain the completer's batch on the owning I/O task.
    pub fn process_completions(&mut self) {
        let completer = self.completer.clone();
        completer.complete_commands(self);
    }

    fn send_accept_and_completion(&mut self) -> Result<(), SessionError> {
        if !self.accepted.is_empty() {
            let transfers = std::mem::take(&mut self.accepted);
            self.send_frame(Frame::control(Control::MessageAccept { transfers }))?;
        }
        self.send_completion()
    }

    /// Flush the cumulative completion state to the peer. Idempotent
    /// between receipts: repeating the call emits an identical frame.
    pub fn send_completion(&mut self) -> Result<(), SessionError> {
        let commands = self.completed.clone();
        self.send_frame(Frame::control(Control::ExecutionCompleted { commands }))
    }

    fn send_frame(&mut self, frame: Frame) -> Result<(), SessionError> {
        match &mut self.handler {
            Some(handler) => {
                handler.out(frame);
                Ok(())
            }
            None => Err(SessionError::Detached),
        }
    }

    // -------------------------------------------------------------------
    // Outbound deliveries
    // -------------------------------------------------------------------

    /// Deliver a message to the peer, assigning it the next send-side
    /// command id. The frames are retained for replay until the peer
    /// confirms them.
    pub fn deliver(
        &mut self,
        destination: &str,
        properties: MessageProperties,
        content: Bytes,
        sync: bool,
    ) -> Result<SequenceNumber, SessionError> {
        if !self.is_attached() {
            return Err(SessionError::Detached);
        }
        if self.replay.len() >= self.replay_hard_limit {
            return Err(SessionError::InternalError(format!(
                "replay buffer exhausted at {} frames",
                self.replay.len()
            )));
        }
        let command_id = self.next_send.advance();
        let method = crate::protocol::Method::MessageTransfer {
            destination: destination.to_string(),
            accept_mode: crate::protocol::AcceptMode::None,
            acquire_mode: crate::protocol::AcquireMode::PreAcquired,
        };
        let frames = vec![
            Frame::transfer(method, sync),
            Frame::header(properties),
            Frame::content_end(content),
        ];
        for frame in &frames {
            self.send_frame(frame.clone())?;
        }
        self.replay.push_back(ReplayEntry { command_id, frames });
        self.semantic.record_delivery(command_id);
        self.mgmt.set_unacked_messages(self.semantic.unacked_count());
        Ok(command_id)
    }

    /// The peer confirmed these send-side commands; release their
    /// replay buffers.
    pub fn sender_completed(&mut self, commands: &SequenceSet) {
        self.replay.retain(|entry| !commands.contains(entry.command_id));
        self.semantic.completed(commands);
        self.mgmt.set_unacked_messages(self.semantic.unacked_count());
    }

    pub fn replay_depth(&self) -> usize {
        self.replay.len()
    }

    /// Frames retained for replaying unconfirmed deliveries to a
    /// resumed peer.
    pub fn replay_frames(&self) -> Vec<Frame> {
        self.replay
            .iter()
            .flat_map(|entry| entry.frames.iter().cloned())
            .collect()
    }

    // -------------------------------------------------------------------
    // Management
    // -------------------------------------------------------------------

    pub fn management_method(
        &mut self,
        method: SessionMethod,
        authorized: bool,
    ) -> MethodStatus {
        if !authorized {
            return MethodStatus::Forbidden;
        }
        match method {
            SessionMethod::Detach => {
                let name = self.id.name().to_string();
                if self
                    .send_frame(Frame::control(Control::SessionDetach { name }))
                    .is_ok()
                {
                    self.detach();
                }
                MethodStatus::Ok
            }
            SessionMethod::Close
            | SessionMethod::SolicitAck
            | SessionMethod::ResetLifespan => MethodStatus::NotImplemented,
        }
    }

    // -------------------------------------------------------------------
    // Introspection used by the connection layer and tests
    // -------------------------------------------------------------------

    pub fn completed_commands(&self) -> &SequenceSet {
        &self.completed
    }

    pub fn incomplete_commands(&self) -> &SequenceSet {
        &self.incomplete
    }

    pub fn rejected_commands(&self) -> &SequenceSet {
        &self.rejected
    }

    pub fn pending_sync_count(&self) -> usize {
        self.pending_execution_syncs.len()
    }
}

impl<C: Clock> Drop for SessionState<C> {
    fn drop(&mut self) {
        self.completer.cancel();
        self.mgmt.resource_destroy();
    }
}
