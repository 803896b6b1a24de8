//! The seam between the mediation layer and the hosted computation.
//!
//! A computation is opaque: it receives its source text and a [`ConsoleIo`]
//! carrying the only two hooks it may call, `write` and `await_input`, plus
//! read access to the cancellation signal for its own checkpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::cancel::InterruptCell;
use crate::error::{CancelReason, Cancelled, InputError};
use crate::output::SharedOutput;
use crate::session::{SessionContext, SessionId};
use crate::ConsoleEvent;

/// A semantic failure reported by the computation itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationError {
    text: String,
    cancelled: bool,
}

impl ComputationError {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cancelled: false,
        }
    }

    /// The computation unwound because it observed a stop request.
    pub fn cancelled(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cancelled: true,
        }
    }

    /// Human-readable description.
    pub fn render(&self) -> &str {
        &self.text
    }

    pub fn is_cancellation(&self) -> bool {
        self.cancelled
    }
}

impl std::fmt::Display for ComputationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// What the computation's entry point settles with: `(result, error)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub value: Option<String>,
    pub error: Option<ComputationError>,
}

impl Completion {
    pub fn ok(value: Option<String>) -> Self {
        Self { value, error: None }
    }

    pub fn failed(error: ComputationError) -> Self {
        Self {
            value: None,
            error: Some(error),
        }
    }
}

/// A hosted computation.
///
/// `Err` from `run` means the entry point itself broke outside its normal
/// error channel; the run controller reports it as a host fault.
#[async_trait]
pub trait Computation: Send + Sync {
    async fn run(
        &self,
        session: SessionId,
        source: &str,
        io: ConsoleIo,
    ) -> anyhow::Result<Completion>;
}

// ────────────────────────────────────────────────────────────────
// Capabilities handed to the computation
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ConsoleIo {
    session: Arc<SessionContext>,
    output: SharedOutput,
    events: broadcast::Sender<ConsoleEvent>,
}

impl ConsoleIo {
    pub(crate) fn new(
        session: Arc<SessionContext>,
        output: SharedOutput,
        events: broadcast::Sender<ConsoleEvent>,
    ) -> Self {
        Self {
            session,
            output,
            events,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    /// Append text to the console. Never suspends, never fails.
    pub fn write(&self, text: &str) {
        self.output.append(text);
    }

    /// Suspend until the human commits a line.
    ///
    /// Fails fast when stop was requested before the call, and fails later
    /// if stop is requested while waiting.
    pub async fn await_input(&self, prompt: &str) -> Result<String, InputError> {
        let signal = self.session.signal();
        signal.checkpoint()?;

        let mediator = self.session.mediator();
        let handle = mediator.request(prompt);

        // A stop that landed between the check above and the enqueue has
        // already run its cancel_all; reject our own waiter.
        if signal.is_stop_requested() {
            mediator.cancel_all(CancelReason::StopRequested);
        }

        if handle.is_ready() {
            return handle.await;
        }

        let _ = self.events.send(ConsoleEvent::InputRequested {
            prompt: prompt.to_string(),
        });
        let settled = handle.await;
        let _ = self.events.send(ConsoleEvent::InputSettled);
        settled
    }

    /// Poll both cancellation channels.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        self.session.signal().checkpoint()
    }

    /// The shared interrupt cell, when this environment provides one.
    pub fn interrupt_cell(&self) -> Option<InterruptCell> {
        self.session.signal().interrupt_cell().cloned()
    }
}
