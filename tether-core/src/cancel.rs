//! Cooperative cancellation.
//!
//! Two independent channels carry the same "stop" event:
//!
//! 1. a boolean flag, always present and authoritative,
//! 2. an optional shared integer cell that a computation can poll from its
//!    own checkpoint loop without going through the mediator at all.
//!
//! Neither channel preempts anything. A computation that never reaches a
//! checkpoint or an input call keeps running.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use crate::error::{CancelReason, Cancelled};
use crate::input::InputMediator;

/// Value written into the interrupt cell on stop (SIGINT).
pub const SIGINT: i32 = 2;

/// Shared integer cell polled by the computation's own step logic.
#[derive(Debug, Clone, Default)]
pub struct InterruptCell(Arc<AtomicI32>);

impl InterruptCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, signal: i32) {
        self.0.store(signal, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(0, Ordering::SeqCst);
    }

    /// Pending signal number, 0 when nothing is pending.
    pub fn load(&self) -> i32 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_raised(&self) -> bool {
        self.load() != 0
    }
}

#[derive(Debug, Default)]
pub struct CancellationSignal {
    stop: AtomicBool,
    interrupt: Option<InterruptCell>,
}

impl CancellationSignal {
    pub fn new(with_interrupt_cell: bool) -> Self {
        Self {
            stop: AtomicBool::new(false),
            interrupt: with_interrupt_cell.then(InterruptCell::new),
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn interrupt_cell(&self) -> Option<&InterruptCell> {
        self.interrupt.as_ref()
    }

    /// Either channel counts.
    pub fn is_raised(&self) -> bool {
        self.is_stop_requested() || self.interrupt.as_ref().is_some_and(InterruptCell::is_raised)
    }

    /// Poll point for computations.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_raised() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

// ────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CancellationController {
    signal: Arc<CancellationSignal>,
    mediator: Arc<InputMediator>,
}

impl CancellationController {
    pub fn new(signal: Arc<CancellationSignal>, mediator: Arc<InputMediator>) -> Self {
        Self { signal, mediator }
    }

    pub fn signal(&self) -> &Arc<CancellationSignal> {
        &self.signal
    }

    /// Raise both channels and fail every pending input request.
    ///
    /// Returns false when a stop was already in flight; the second call has
    /// no effect.
    pub fn request_stop(&self) -> bool {
        if self.signal.stop.swap(true, Ordering::SeqCst) {
            tracing::debug!("stop already requested");
            return false;
        }

        if let Some(cell) = &self.signal.interrupt {
            cell.raise(SIGINT);
        }

        let rejected = self.mediator.cancel_all(CancelReason::StopRequested);
        tracing::info!(rejected, "stop requested");
        true
    }

    /// Lower both channels. Called once per session, before the
    /// computation starts.
    pub fn clear(&self) {
        self.signal.stop.store(false, Ordering::SeqCst);
        if let Some(cell) = &self.signal.interrupt {
            cell.clear();
        }
    }
}
