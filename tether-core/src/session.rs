//! Session-scoped context.
//!
//! Every run gets a fresh mediator and cancellation signal. Nothing from a
//! previous run (type-ahead, a forgotten waiter, a raised stop flag) can
//! leak into the next one because the next one never sees those objects.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::cancel::{CancellationController, CancellationSignal};
use crate::error::CancelReason;
use crate::input::InputMediator;

pub type SessionId = Uuid;

/// Run lifecycle.
///
/// `Idle --start--> Running --stop--> StopRequested --settle--> Idle`,
/// and `Running --settle--> Idle` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Running,
    StopRequested,
}

impl RunState {
    /// `StopRequested` is still running until the computation unwinds.
    pub fn is_running(self) -> bool {
        !matches!(self, RunState::Idle)
    }

    pub fn label(self) -> &'static str {
        match self {
            RunState::Idle => "Ready",
            RunState::Running => "Running...",
            RunState::StopRequested => "Stopping...",
        }
    }
}

#[derive(Debug)]
pub struct SessionContext {
    id: SessionId,
    mediator: Arc<InputMediator>,
    cancellation: CancellationController,
}

impl SessionContext {
    pub fn create(with_interrupt_cell: bool) -> Self {
        let mediator = Arc::new(InputMediator::new());
        let signal = Arc::new(CancellationSignal::new(with_interrupt_cell));
        let cancellation = CancellationController::new(signal, mediator.clone());
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, with_interrupt_cell, "session created");
        Self {
            id,
            mediator,
            cancellation,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn mediator(&self) -> &Arc<InputMediator> {
        &self.mediator
    }

    pub fn cancellation(&self) -> &CancellationController {
        &self.cancellation
    }

    pub fn signal(&self) -> &Arc<CancellationSignal> {
        self.cancellation.signal()
    }

    /// Tear the session down. Outstanding waiters at this point are
    /// defects; they are rejected and reported, never left dangling.
    /// Returns the number of stale waiters found.
    pub fn dispose(&self) -> usize {
        let stale = self.mediator.reset();
        if stale > 0 {
            tracing::warn!(session = %self.id, stale, "session disposed with pending input");
        }
        // Anything that raced in after the reset still gets an answer.
        self.mediator.cancel_all(CancelReason::SessionClosed);
        tracing::debug!(session = %self.id, "session disposed");
        stale
    }
}
