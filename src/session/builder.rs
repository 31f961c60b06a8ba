//! Frameset assembly.
//!
//! Collects the frames of one content-bearing command into a
//! [`Message`]. The session starts a build when a frameset opens, feeds
//! every frame through, and closes the build at the end of the
//! frameset.

use crate::message::Message;
use crate::protocol::{AcceptMode, Frame, FrameBody, MessageProperties, Method, SequenceNumber};
use crate::session::error::SessionError;
use bytes::BytesMut;

struct InProgress {
    command_id: SequenceNumber,
    destination: String,
    requires_accept: bool,
    requires_sync: bool,
    properties: Option<MessageProperties>,
    content: BytesMut,
}

/// Per-session message builder; at most one frameset is in flight at a
/// time on a session.
#[derive(Default)]
pub struct MessageBuilder {
    in_progress: Option<InProgress>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a build for the command identified by `id`.
    pub fn start(&mut self, id: SequenceNumber) {
        debug_assert!(
            self.in_progress.is_none(),
            "frameset started while another is in flight"
        );
        self.in_progress = Some(InProgress {
            command_id: id,
            destination: String::new(),
            requires_accept: false,
            requires_sync: false,
            properties: None,
            content: BytesMut::new(),
        });
    }

    pub fn handle(&mut self, frame: &Frame) -> Result<(), SessionError> {
        let build = self.in_progress.as_mut().ok_or_else(|| {
            SessionError::InternalError("content frame outside any frameset".into())
        })?;
        match &frame.body {
            FrameBody::Method { method, sync } => match method {
                Method::MessageTransfer {
                    destination,
                    accept_mode,
                    ..
                } => {
                    build.destination = destination.clone();
                    build.requires_accept = *accept_mode == AcceptMode::Explicit;
                    build.requires_sync = *sync;
                    Ok(())
                }
                other => Err(SessionError::InternalError(format!(
                    "non-transfer method {} in content frameset",
                    other.name()
                ))),
            },
            FrameBody::Header(properties) => {
                if build.properties.is_some() {
                    return Err(SessionError::InternalError(
                        "duplicate header segment in frameset".into(),
                    ));
                }
                build.properties = Some(properties.clone());
                Ok(())
            }
            FrameBody::Content(bytes) => {
                build.content.extend_from_slice(bytes);
                Ok(())
            }
            FrameBody::Control(_) => Err(SessionError::InternalError(
                "control frame inside content frameset".into(),
            )),
        }
    }

    /// Close the build and produce the message. A headerless frameset
    /// gets an empty synthesized header.
    pub fn end(&mut self, headerless: bool) -> Result<Message, SessionError> {
        let build = self.in_progress.take().ok_or_else(|| {
            SessionError::InternalError("frameset end without a build in flight".into())
        })?;
        let properties = match build.properties {
            Some(properties) => properties,
            None if headerless => MessageProperties::default(),
            None => {
                return Err(SessionError::InternalError(
                    "frameset closed without a header segment".into(),
                ))
            }
        };
        Ok(Message::new(
            build.command_id,
            build.destination,
            build.requires_accept,
            build.requires_sync,
            properties,
            build.content.freeze(),
        ))
    }

    /// Discard a partial build after a malformed frameset.
    pub fn abort(&mut self) {
        self.in_progress = None;
    }

    pub fn in_flight(&self) -> bool {
        self.in_progress.is_some()
    }
}
