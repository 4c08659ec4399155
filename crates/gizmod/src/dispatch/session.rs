//! Receive loop for one controller connection.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use gizmo_protocol::{FrameDecoder, FrameError, FrameReadError, FrameReader, Response};

use crate::transport::ConnectionStream;

use super::dispatcher::Dispatcher;
use super::errors::DispatchError;
use super::registry::{SessionId, SessionWriter};
use super::{DISPATCH_TARGET, FRAME_TOO_LARGE_MESSAGE};

/// Lifecycle of a session.
///
/// `Connecting` becomes `Ready` once the writer is registered for
/// broadcasts; `Failed` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket accepted; writer not yet registered.
    Connecting,
    /// Serving requests and receiving broadcasts.
    Ready,
    /// A read or write failed.
    Failed,
    /// The peer disconnected or sent an oversized frame.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Closed => "closed",
        })
    }
}

/// Serves `stream` until the peer disconnects or the session fails.
///
/// Returns the terminal state.
pub(crate) fn run_session(dispatcher: &Dispatcher, stream: ConnectionStream) -> SessionState {
    let settings = dispatcher.settings();
    let timeout = Some(settings.write_timeout).filter(|timeout| !timeout.is_zero());
    let handles = stream
        .set_write_timeout(timeout)
        .and_then(|()| Ok((stream.try_clone()?, stream.try_clone()?)));
    let writer = match handles {
        Ok((writer, control)) => Arc::new(SessionWriter::new(Box::new(writer)).with_closer(
            move || {
                let _ = control.shutdown();
            },
        )),
        Err(error) => {
            warn!(
                target: DISPATCH_TARGET,
                error = %error,
                state = %SessionState::Connecting,
                "failed to prepare session"
            );
            let _ = stream.shutdown();
            return SessionState::Failed;
        }
    };

    let id = dispatcher.sessions().register(Arc::clone(&writer));
    info!(target: DISPATCH_TARGET, session = %id, "session ready");

    let mut reader =
        FrameReader::with_decoder(stream, FrameDecoder::with_limit(settings.max_frame_bytes));
    let state = receive_loop(dispatcher, id, &writer, &mut reader);

    dispatcher.sessions().remove(id);
    if let Err(error) = reader.into_inner().shutdown() {
        debug!(
            target: DISPATCH_TARGET,
            session = %id,
            error = %error,
            "socket shutdown failed"
        );
    }
    info!(target: DISPATCH_TARGET, session = %id, state = %state, "session ended");
    state
}

fn receive_loop(
    dispatcher: &Dispatcher,
    id: SessionId,
    writer: &SessionWriter,
    reader: &mut FrameReader<ConnectionStream>,
) -> SessionState {
    while let Some(item) = reader.next() {
        match item {
            Ok(frame) => {
                if frame.trim_ascii().is_empty() {
                    continue;
                }
                let Some(response) = dispatcher.handle_frame(&frame) else {
                    continue;
                };
                if let Err(error) = send(writer, &response) {
                    warn!(
                        target: DISPATCH_TARGET,
                        session = %id,
                        error = %error,
                        "failed to write response"
                    );
                    return SessionState::Failed;
                }
            }
            Err(FrameReadError::Frame(error @ FrameError::TooLarge { .. })) => {
                warn!(
                    target: DISPATCH_TARGET,
                    session = %id,
                    error = %error,
                    "closing session after oversized frame"
                );
                if let Err(error) = send(writer, &Response::error(FRAME_TOO_LARGE_MESSAGE)) {
                    debug!(
                        target: DISPATCH_TARGET,
                        session = %id,
                        error = %error,
                        "failed to report oversized frame"
                    );
                }
                return SessionState::Closed;
            }
            Err(FrameReadError::Io(error)) => {
                warn!(
                    target: DISPATCH_TARGET,
                    session = %id,
                    error = %error,
                    "session read failed"
                );
                return SessionState::Failed;
            }
        }
    }
    if writer.has_failed() {
        debug!(
            target: DISPATCH_TARGET,
            session = %id,
            "session socket closed after a failed write"
        );
        return SessionState::Failed;
    }
    if reader.discarded_tail() > 0 {
        debug!(
            target: DISPATCH_TARGET,
            session = %id,
            bytes = reader.discarded_tail(),
            "discarded unterminated frame at end of stream"
        );
    }
    SessionState::Closed
}

fn send(writer: &SessionWriter, response: &Response) -> Result<(), DispatchError> {
    let frame = response.to_frame()?;
    writer.write_frame(&frame)?;
    Ok(())
}
