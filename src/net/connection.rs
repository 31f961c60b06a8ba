//! Per-connection I/O task.
//!
//! Each connection owns its sessions on a single task: inbound frames
//! from the decoder boundary and completion wakeups from worker threads
//! are multiplexed into one loop, so session state is only ever touched
//! here. Decoding bytes into frames and the TCP transport itself sit
//! outside this crate.

use crate::core::time::Clock;
use crate::protocol::Frame;
use crate::session::state::SessionState;
use tokio::sync::mpsc;

/// Drive one session until its frame source closes or a fatal error
/// detaches it.
pub async fn run_session<C: Clock>(
    mut session: SessionState<C>,
    mut frames: mpsc::Receiver<Frame>,
    mut wakeups: mpsc::UnboundedReceiver<()>,
) {
    loop {
        tokio::select! {
            maybe_frame = frames.recv() => {
                match maybe_frame {
                    Some(frame) => {
                        if let Err(err) = session.handle_in(frame) {
                            if err.is_fatal() {
                                tracing::error!(session = %session.id(), %err, "session failed; detaching");
                                session.detach();
                                break;
                            }
                            tracing::warn!(session = %session.id(), %err, "command failed; session continues");
                        }
                    }
                    None => {
                        tracing::debug!(session = %session.id(), "frame source closed");
                        session.detach();
                        break;
                    }
                }
            }
            wakeup = wakeups.recv() => {
                match wakeup {
                    Some(()) => session.process_completions(),
                    None => break,
                }
            }
        }
    }
}
