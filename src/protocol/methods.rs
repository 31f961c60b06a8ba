//! The subset of AMQP 0-10 methods the session dispatches.
//!
//! Wire parsing lives behind the frame-decoder boundary; by the time a
//! method reaches the session it is already a typed value. Methods that
//! carry message content (`message.transfer`) take the content path in
//! the session; everything else is dispatched through the invoker.

use crate::protocol::sequence::SequenceSet;
use std::collections::HashMap;

/// Accept mode requested by the peer on a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceptMode {
    /// Each received transfer must be explicitly accepted back to the
    /// peer with a `message.accept`.
    Explicit,
    /// Transfers are considered accepted on completion.
    #[default]
    None,
}

/// Acquire mode requested by the peer on a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquireMode {
    #[default]
    PreAcquired,
    NotAcquired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// Content-bearing: header and content frames follow in the same
    /// frameset.
    MessageTransfer {
        destination: String,
        accept_mode: AcceptMode,
        acquire_mode: AcquireMode,
    },
    /// Barrier: completes only once all preceding commands complete.
    ExecutionSync,
    QueueDeclare {
        queue: String,
        durable: bool,
        arguments: HashMap<String, String>,
    },
    QueueQuery {
        queue: String,
    },
    QueuePurge {
        queue: String,
    },
    QueueDelete {
        queue: String,
    },
    ExchangeDeclare {
        exchange: String,
        kind: String,
    },
    ExchangeBind {
        exchange: String,
        queue: String,
        binding_key: String,
    },
    /// Declared on the wire but not handled by this broker.
    ExchangeDelete {
        exchange: String,
    },
}

impl Method {
    pub fn is_content_bearing(&self) -> bool {
        matches!(self, Method::MessageTransfer { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Method::MessageTransfer { .. } => "message.transfer",
            Method::ExecutionSync => "execution.sync",
            Method::QueueDeclare { .. } => "queue.declare",
            Method::QueueQuery { .. } => "queue.query",
            Method::QueuePurge { .. } => "queue.purge",
            Method::QueueDelete { .. } => "queue.delete",
            Method::ExchangeDeclare { .. } => "exchange.declare",
            Method::ExchangeBind { .. } => "exchange.bind",
            Method::ExchangeDelete { .. } => "exchange.delete",
        }
    }
}

/// Result payload carried by an `execution.result` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultValue {
    QueueQuery(QueueQueryResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueQueryResult {
    pub queue: String,
    pub durable: bool,
    pub message_count: u64,
    pub byte_depth: u64,
    pub subscriber_count: u64,
}

/// Session-level control frames emitted back to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    ExecutionResult {
        command_id: super::sequence::SequenceNumber,
        value: ResultValue,
    },
    ExecutionCompleted {
        commands: SequenceSet,
    },
    MessageAccept {
        transfers: SequenceSet,
    },
    SessionDetach {
        name: String,
    },
}
