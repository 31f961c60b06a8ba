//! Session attachment surface.
//!
//! While attached, a session emits frames and requests I/O-loop wakeups
//! through its handler; a detached session has no handler and must not
//! emit anything.

use crate::protocol::Frame;
use tokio::sync::mpsc;

/// Outbound side of an attached session: the frame sink owned by the
/// connection's I/O task.
pub trait SessionHandler: Send {
    /// Forward a frame towards the peer.
    fn out(&mut self, frame: Frame);

    /// Channel number the session is attached on.
    fn channel(&self) -> u16;

    /// Identity of the owning connection, recorded as publisher on
    /// received messages.
    fn connection_id(&self) -> &str;
}

/// Wakes the connection's I/O loop so queued completions get drained.
/// Clonable and callable from any thread.
#[derive(Clone)]
pub struct CompletionWakeup {
    tx: mpsc::UnboundedSender<()>,
}

impl CompletionWakeup {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn notify(&self) {
        // A dropped receiver means the I/O loop is gone; nothing left
        // to wake.
        let _ = self.tx.send(());
    }
}

/// Handler that forwards frames into a channel owned by the connection
/// writer.
pub struct ChannelHandler {
    channel: u16,
    connection_id: String,
    out_tx: mpsc::UnboundedSender<Frame>,
}

impl ChannelHandler {
    pub fn new(channel: u16, connection_id: &str, out_tx: mpsc::UnboundedSender<Frame>) -> Self {
        Self {
            channel,
            connection_id: connection_id.to_string(),
            out_tx,
        }
    }
}

impl SessionHandler for ChannelHandler {
    fn out(&mut self, frame: Frame) {
        let _ = self.out_tx.send(frame);
    }

    fn channel(&self) -> u16 {
        self.channel
    }

    fn connection_id(&self) -> &str {
        &self.connection_id
    }
}
