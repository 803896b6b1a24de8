//! # Tether Core
//!
//! The interactive I/O mediation layer. A single hosted computation runs
//! to completion while the console:
//!
//! - collects its output into numbered lines ([`output`]),
//! - brokers its blocking line requests against human input ([`input`]),
//! - lets the human stop it cooperatively ([`cancel`]),
//! - and owns the run lifecycle end to end ([`runner`]).

pub mod cancel;
pub mod computation;
pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod runner;
pub mod session;

// Re-export the main types so users can just use `tether_core::RunController`
pub use computation::{Completion, Computation, ComputationError, ConsoleIo};
pub use config::ConsoleConfig;
pub use error::{CancelReason, Cancelled, ConsoleError, InputError};
pub use output::{Line, OutputBuffer};
pub use runner::{panic_message, RunController, RunOutcome, RunReport};
pub use session::{RunState, SessionId};

/// Notifications toward the presentation layer. The UI listens to these to
/// know when to redraw and when to show or hide the input line.
#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    /// The output buffer changed (or was touched); re-measure scroll.
    OutputChanged,
    /// The computation is now blocked on a line.
    InputRequested { prompt: String },
    /// The pending line request settled (value or cancellation).
    InputSettled,
    StateChanged(RunState),
    RunFinished(RunReport),
}
