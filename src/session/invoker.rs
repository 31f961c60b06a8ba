//! Method dispatch.
//!
//! Non-content commands are dispatched here against the broker's
//! registries. A method the broker knows but does not implement is
//! reported unhandled; the session translates that into a
//! not-implemented failure without tearing the session down.

use crate::core::time::Clock;
use crate::protocol::{Method, ResultValue};
use crate::queue::QueueSettings;
use crate::session::error::SessionError;
use crate::session::state::SessionState;

/// Outcome of one method invocation.
pub enum Invocation {
    Handled,
    Result(ResultValue),
    NotHandled,
}

pub fn invoke<C: Clock>(
    session: &mut SessionState<C>,
    method: &Method,
) -> Result<Invocation, SessionError> {
    match method {
        // Transfers never reach the invoker; they take the content path.
        Method::MessageTransfer { .. } => Ok(Invocation::NotHandled),

        Method::ExecutionSync => {
            session.add_pending_execution_sync();
            Ok(Invocation::Handled)
        }

        Method::QueueDeclare {
            queue,
            durable,
            arguments,
        } => {
            let mut settings = QueueSettings::from_arguments(arguments)
                .map_err(|e| SessionError::InvalidArgument(e.to_string()))?;
            settings.durable = settings.durable || *durable;
            let broker = session.broker().clone();
            broker
                .queues()
                .declare(broker.queue_factory(), queue, settings)
                .map_err(|e| SessionError::InvalidArgument(e.to_string()))?;
            Ok(Invocation::Handled)
        }

        Method::QueueQuery { queue } => {
            let result = match session.broker().queues().get(queue) {
                Some(found) => found.query(),
                None => crate::protocol::QueueQueryResult {
                    queue: queue.clone(),
                    durable: false,
                    message_count: 0,
                    byte_depth: 0,
                    subscriber_count: 0,
                },
            };
            Ok(Invocation::Result(ResultValue::QueueQuery(result)))
        }

        Method::QueuePurge { queue } => {
            let found = session
                .broker()
                .queues()
                .get(queue)
                .ok_or_else(|| SessionError::InvalidArgument(format!("no such queue: {queue}")))?;
            let purged = found.purge();
            tracing::debug!(queue = %queue, purged, "queue purged");
            Ok(Invocation::Handled)
        }

        Method::QueueDelete { queue } => {
            session
                .broker()
                .queues()
                .delete(queue)
                .ok_or_else(|| SessionError::InvalidArgument(format!("no such queue: {queue}")))?;
            Ok(Invocation::Handled)
        }

        Method::ExchangeDeclare { exchange, kind } => {
            session.broker().exchanges().declare(exchange, kind);
            Ok(Invocation::Handled)
        }

        Method::ExchangeBind {
            exchange,
            queue,
            binding_key,
        } => {
            let broker = session.broker().clone();
            let exchange = broker.exchanges().get(exchange).ok_or_else(|| {
                SessionError::InvalidArgument(format!("no such exchange: {exchange}"))
            })?;
            let queue = broker
                .queues()
                .get(queue)
                .ok_or_else(|| SessionError::InvalidArgument(format!("no such queue: {queue}")))?;
            exchange.bind(queue, binding_key);
            Ok(Invocation::Handled)
        }

        Method::ExchangeDelete { .. } => Ok(Invocation::NotHandled),
    }
}
