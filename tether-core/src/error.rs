use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why pending input requests were cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// The human (or the host) asked the run to stop.
    StopRequested,
    /// The session was torn down while requests were outstanding.
    SessionClosed,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::StopRequested => write!(f, "stop requested"),
            CancelReason::SessionClosed => write!(f, "session closed"),
        }
    }
}

/// Outcome of an `await_input` call that did not yield a line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("input cancelled: {0}")]
    Cancelled(CancelReason),

    /// The request outlived the session that created it.
    #[error("input request outlived its session")]
    StaleWaiter,

    /// The mediator was dropped before the request settled.
    #[error("input mediator went away")]
    Abandoned,
}

impl InputError {
    pub fn is_cancellation(&self) -> bool {
        !matches!(self, InputError::Abandoned)
    }
}

/// Raised by a checkpoint once stop has been requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("execution stopped by user")]
pub struct Cancelled;

impl From<Cancelled> for InputError {
    fn from(_: Cancelled) -> Self {
        InputError::Cancelled(CancelReason::StopRequested)
    }
}

/// Errors surfaced by the run controller to its caller.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// `start` was called while a session was live. Nothing changed.
    #[error("a run is already in progress")]
    Busy,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
