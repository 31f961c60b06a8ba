//! Session frames as handed over by the frame decoder.
//!
//! Flag semantics: `bof`/`eof` mark the first/last frame of a frameset
//! and `bos`/`eos` its first/last segment. A self-contained method
//! frame carries all four flags; a content frameset opens with a
//! `bof && bos` frame and closes with an `eof && eos` frame, with
//! header and content continuation frames (no boundary flags) in
//! between. A closing frame that still carries `bof` is a frameset of
//! one frame, i.e. a headerless transfer.

use crate::protocol::methods::{Control, Method};
use bytes::Bytes;
use std::collections::HashMap;

/// Message properties delivered in the header segment of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageProperties {
    pub routing_key: String,
    pub priority: u8,
    pub durable: bool,
    /// Publish timestamp in seconds since the epoch, if stamped.
    pub timestamp: Option<u64>,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    Method { method: Method, sync: bool },
    Header(MessageProperties),
    Content(Bytes),
    Control(Control),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub bof: bool,
    pub eof: bool,
    pub bos: bool,
    pub eos: bool,
    pub body: FrameBody,
}

impl Frame {
    /// A complete, self-contained method frame.
    pub fn method(method: Method) -> Self {
        Self {
            bof: true,
            eof: true,
            bos: true,
            eos: true,
            body: FrameBody::Method {
                method,
                sync: false,
            },
        }
    }

    /// A complete method frame with the sync bit set.
    pub fn method_sync(method: Method) -> Self {
        let mut frame = Self::method(method);
        if let FrameBody::Method { sync, .. } = &mut frame.body {
            *sync = true;
        }
        frame
    }

    /// The opening frame of a content-bearing frameset.
    pub fn transfer(method: Method, sync: bool) -> Self {
        debug_assert!(method.is_content_bearing());
        Self {
            bof: true,
            eof: false,
            bos: true,
            eos: false,
            body: FrameBody::Method { method, sync },
        }
    }

    /// A headerless, contentless transfer: one frame is the whole
    /// frameset.
    pub fn transfer_complete(method: Method, sync: bool) -> Self {
        debug_assert!(method.is_content_bearing());
        Self {
            bof: true,
            eof: true,
            bos: true,
            eos: true,
            body: FrameBody::Method { method, sync },
        }
    }

    /// A header continuation frame within a frameset.
    pub fn header(properties: MessageProperties) -> Self {
        Self {
            bof: false,
            eof: false,
            bos: false,
            eos: false,
            body: FrameBody::Header(properties),
        }
    }

    /// An intermediate content frame.
    pub fn content(content: Bytes) -> Self {
        Self {
            bof: false,
            eof: false,
            bos: false,
            eos: false,
            body: FrameBody::Content(content),
        }
    }

    /// The final content frame of a frameset.
    pub fn content_end(content: Bytes) -> Self {
        Self {
            bof: false,
            eof: true,
            bos: false,
            eos: true,
            body: FrameBody::Content(content),
        }
    }

    pub fn control(control: Control) -> Self {
        Self {
            bof: true,
            eof: true,
            bos: true,
            eos: true,
            body: FrameBody::Control(control),
        }
    }

    pub fn method_body(&self) -> Option<&Method> {
        match &self.body {
            FrameBody::Method { method, .. } => Some(method),
            _ => None,
        }
    }

    pub fn method_is_sync(&self) -> bool {
        matches!(&self.body, FrameBody::Method { sync: true, .. })
    }

    /// True when this frame opens a new command.
    pub fn starts_command(&self) -> bool {
        self.bof && self.bos
    }

    /// True when this frame closes its frameset.
    pub fn ends_frameset(&self) -> bool {
        self.eof && self.eos
    }
}
