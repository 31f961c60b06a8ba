#![deny(unused, dead_code)]
#![deny(clippy::all, clippy::pedantic)]
// Module naming: common pattern in domain-driven code
#![allow(clippy::module_name_repetitions)]
// Function complexity: some functions are inherently complex
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
// Variable naming: domain terms often similar
#![allow(clippy::similar_names)]
// Documentation style: many terms don't need backticks
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// API ergonomics: prefer simplicity over must_use annotations
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
// Format strings: allow non-inlined for readability
#![allow(clippy::uninlined_format_args)]
// Numeric casts: intentional in protocol code
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_lossless)]
// Control flow style
#![allow(clippy::if_not_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::single_match_else)]
// Passing style
#![allow(clippy::needless_pass_by_value)]
// Struct field patterns
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::struct_field_names)]
// Large types
#![allow(clippy::large_enum_variant)]
// Explicit type bounds
#![allow(clippy::significant_drop_tightening)]
// Error handling style
#![allow(clippy::result_large_err)]
// Import style
#![allow(clippy::wildcard_imports)]
// Type defaults
#![allow(clippy::implicit_hasher)]
// Iteration style
#![allow(clippy::explicit_iter_loop)]
#![allow(clippy::iter_without_into_iter)]
// Option/Result patterns
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
// Self usage
#![allow(clippy::unused_self)]
// Debug impl completeness
#![allow(clippy::missing_fields_in_debug)]
// Control flow style
#![allow(clippy::items_after_statements)]

//! Stratus - AMQP 0-10 message broker.
//!
//! # Module Organization
//!
//! ## Core
//! - `core::config` - Configuration parsing and validation
//! - `core::broker` - Broker assembly and shared registries
//! - `core::time` - Deterministic time utilities
//!
//! ## Protocol
//! - `protocol::frame` - Session frames and flags
//! - `protocol::methods` - Dispatched method subset
//! - `protocol::sequence` - Serial ids and ranged id sets
//!
//! ## Sessions
//! - `session::state` - Per-session inbound command pipeline
//! - `session::completer` - Cross-thread completion bridging
//! - `session::builder` - Frameset assembly
//! - `session::invoker` - Method dispatch
//! - `session::semantic` - Routing entry and delivery records
//!
//! ## Messages & Queues
//! - `message` - Shared message value and ingress completion
//! - `queue::factory` - Ordered queue construction
//! - `queue::flow_limit` - Producer flow control
//! - `queue::messages` - FIFO / priority / last-value containers
//! - `queue::distributor` - FIFO and group-aware distribution
//!
//! ## Supporting
//! - `exchange` - Binding registry for routing
//! - `store` - Persistence seam
//! - `mgmt` - Management agent and managed objects
//! - `net` - Per-connection I/O task

// Core infrastructure
pub mod core;

// Wire surface
pub mod protocol;

// Messages
pub mod message;

// Sessions
pub mod session;

// Queues & routing
pub mod exchange;
pub mod queue;

// Persistence seam
pub mod store;

// Management
pub mod mgmt;

// Connection plumbing
pub mod net;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{broker::Broker, config::Config, time::Clock, time::SystemClock};
pub use message::{IngressCompletion, Message, QueuedMessage};
pub use protocol::{Frame, Method, SequenceNumber, SequenceSet};
pub use queue::{QueueFactory, QueueFlowLimit, QueueSettings};
pub use session::{SessionError, SessionId, SessionState};
