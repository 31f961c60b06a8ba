//! Session failure taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Protocol invariant violation; fatal to the session.
    #[error("internal error: {0}")]
    InternalError(String),
    /// Unknown or unimplemented method; the session continues.
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// A method carried arguments the broker rejects; the session
    /// continues.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A frame-emitting operation was invoked while detached.
    #[error("session is detached")]
    Detached,
}

impl SessionError {
    /// Whether the connection should tear the session down.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InternalError(_))
    }
}
