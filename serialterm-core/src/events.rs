use serialterm_io::{DeviceList, ErrorCode, LineSettings, PortError};
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

/// Lifecycle state of a session, as shown on the connect/pause button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Terminal: the worker has been told to exit.
    Stopped,
    /// Running with the port closed; no I/O happens.
    Paused,
    /// Running and reading from the port.
    Open,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Stopped => "stopped",
            SessionState::Paused => "paused",
            SessionState::Open => "open",
        };
        f.write_str(s)
    }
}

/// Notifications from the session to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Error { code: ErrorCode, message: String },
    PortConfigChanged(LineSettings),
    DeviceListChanged(DeviceList),
    StateChanged(SessionState),
}

/// Sending half of the event stream. A dropped receiver is not an error:
/// the session keeps running without listeners.
#[derive(Debug, Clone)]
pub(crate) struct EventSink(mpsc::UnboundedSender<SessionEvent>);

impl EventSink {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        if self.0.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }

    pub(crate) fn error(&self, err: &PortError) {
        self.emit(SessionEvent::Error {
            code: err.code(),
            message: err.to_string(),
        });
    }
}
