//! Typed session wire surface: frames, methods, sequence bookkeeping.

pub mod frame;
pub mod methods;
pub mod sequence;

pub use frame::{Frame, FrameBody, MessageProperties};
pub use methods::{AcceptMode, AcquireMode, Control, Method, QueueQueryResult, ResultValue};
pub use sequence::{SequenceNumber, SequenceSet};
