//! Per-session inbound command pipeline.
//!
//! - `state` - sequence bookkeeping and the two command paths
//! - `completer` - asynchronous completion bridged to the I/O task
//! - `builder` - frameset assembly into messages
//! - `invoker` - method dispatch against the broker
//! - `semantic` - routing entry and delivery records
//! - `handler` - attachment surface towards the connection

pub mod builder;
pub mod completer;
pub mod error;
pub mod handler;
pub mod invoker;
pub mod semantic;
pub mod state;

pub use builder::MessageBuilder;
pub use completer::{AsyncCommandCompleter, CompletedTransfer, IncompleteIngressTransfer};
pub use error::SessionError;
pub use handler::{ChannelHandler, CompletionWakeup, SessionHandler};
pub use semantic::SemanticState;
pub use state::{SessionId, SessionState};
