//! Run controller.
//!
//! Owns the one live session, hands the computation its capabilities and
//! turns whatever the computation settles with into console text plus a
//! return to `Idle`. Nothing a computation does propagates past here.

pub mod report;

pub use report::{RunOutcome, RunReport};

use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::computation::{Completion, Computation, ConsoleIo};
use crate::config::ConsoleConfig;
use crate::error::ConsoleError;
use crate::output::{Line, SharedOutput};
use crate::session::{RunState, SessionContext};
use crate::ConsoleEvent;

#[derive(Debug)]
struct Live {
    state: RunState,
    session: Option<Arc<SessionContext>>,
}

struct Inner {
    computation: Arc<dyn Computation>,
    config: ConsoleConfig,
    output: SharedOutput,
    events: broadcast::Sender<ConsoleEvent>,
    live: Mutex<Live>,
}

/// Cheap to clone; clones drive the same console.
#[derive(Clone)]
pub struct RunController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RunController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunController")
            .field("state", &self.state())
            .field("lines", &self.inner.output.len())
            .finish()
    }
}

impl RunController {
    pub fn new(config: ConsoleConfig, computation: Arc<dyn Computation>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let output = SharedOutput::new(events.clone());
        Self {
            inner: Arc::new(Inner {
                computation,
                config,
                output,
                events,
                live: Mutex::new(Live {
                    state: RunState::Idle,
                    session: None,
                }),
            }),
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> RunState {
        self.lock_live().state
    }

    pub fn output(&self) -> &SharedOutput {
        &self.inner.output
    }

    pub fn render(&self) -> Vec<Line> {
        self.inner.output.render()
    }

    /// Prompt of the request the computation is blocked on, if any.
    pub fn pending_prompt(&self) -> Option<String> {
        self.live_session()
            .and_then(|s| s.mediator().pending_prompt())
    }

    pub fn is_awaiting_input(&self) -> bool {
        self.live_session()
            .is_some_and(|s| s.mediator().waiting_len() > 0)
    }

    // ────────────────────────────────────────────────────────────
    // Lifecycle
    // ────────────────────────────────────────────────────────────

    /// Run `source` to completion.
    ///
    /// Rejected with [`ConsoleError::Busy`] (and no other effect) unless
    /// the controller is idle.
    pub async fn start(&self, source: impl Into<String>) -> Result<RunReport, ConsoleError> {
        let source = source.into();

        let session = {
            let mut live = self.lock_live();
            if live.state != RunState::Idle {
                tracing::warn!(state = ?live.state, "start ignored: a run is already live");
                return Err(ConsoleError::Busy);
            }
            if let Some(leftover) = live.session.take() {
                leftover.dispose();
            }
            let session = Arc::new(SessionContext::create(self.inner.config.interrupt_cell));
            live.state = RunState::Running;
            live.session = Some(session.clone());
            session
        };

        self.inner.output.clear();
        session.cancellation().clear();
        self.emit(ConsoleEvent::StateChanged(RunState::Running));
        tracing::info!(session = %session.id(), bytes = source.len(), "run started");

        let started_at = Utc::now();
        let io = ConsoleIo::new(
            session.clone(),
            self.inner.output.clone(),
            self.inner.events.clone(),
        );
        let settled = AssertUnwindSafe(self.inner.computation.run(session.id(), &source, io))
            .catch_unwind()
            .await;

        let outcome = self.classify(&session, settled);
        self.publish(&outcome);
        let report = RunReport::new(session.id(), outcome, started_at);

        {
            let mut live = self.lock_live();
            live.state = RunState::Idle;
            live.session = None;
        }
        session.dispose();

        tracing::info!(
            session = %report.session,
            outcome = report.outcome.label(),
            duration_ms = report.duration_ms,
            "run finished"
        );
        self.emit(ConsoleEvent::RunFinished(report.clone()));
        self.emit(ConsoleEvent::StateChanged(RunState::Idle));
        Ok(report)
    }

    /// Start on the tokio runtime and return immediately.
    pub fn spawn(&self, source: impl Into<String>) -> JoinHandle<Result<RunReport, ConsoleError>> {
        let controller = self.clone();
        let source = source.into();
        tokio::spawn(async move { controller.start(source).await })
    }

    /// Ask the live computation to stop. No-op unless `Running`.
    ///
    /// The controller does not terminate anything; the computation returns
    /// to `Idle` through its own unwind.
    pub fn stop(&self) -> bool {
        let session = {
            let mut live = self.lock_live();
            if live.state != RunState::Running {
                return false;
            }
            live.state = RunState::StopRequested;
            live.session.clone()
        };

        if let Some(session) = session {
            session.cancellation().request_stop();
        }
        self.emit(ConsoleEvent::StateChanged(RunState::StopRequested));
        true
    }

    /// Keyboard interrupt: only while running and not blocked on a line.
    pub fn interrupt(&self) -> bool {
        if self.state() != RunState::Running || self.is_awaiting_input() {
            return false;
        }
        let echo = format!("{}\n", self.inner.config.interrupt_echo);
        self.inner.output.append(&echo);
        self.stop()
    }

    // ────────────────────────────────────────────────────────────
    // Input
    // ────────────────────────────────────────────────────────────

    /// Forward a value to the live session's mediator.
    pub fn supply(&self, value: impl Into<String>) -> bool {
        match self.live_session() {
            Some(session) => {
                session.mediator().supply(value);
                true
            }
            None => {
                tracing::debug!("input supplied with no live session; dropped");
                false
            }
        }
    }

    /// A committed line from the text-entry surface: echo, then supply
    /// exactly once.
    pub fn submit_line(&self, value: &str) -> bool {
        let Some(session) = self.live_session() else {
            tracing::debug!("line committed with no live session; dropped");
            return false;
        };

        if self.inner.config.echo_input {
            let prompt = session.mediator().pending_prompt().unwrap_or_default();
            self.inner.output.append(&format!("{prompt}{value}\n"));
        }
        session.mediator().supply(value);
        true
    }

    /// The "clear terminal" action.
    pub fn clear_output(&self) {
        self.inner.output.clear();
    }

    // ────────────────────────────────────────────────────────────
    // Settle
    // ────────────────────────────────────────────────────────────

    fn classify(
        &self,
        session: &SessionContext,
        settled: Result<anyhow::Result<Completion>, Box<dyn Any + Send>>,
    ) -> RunOutcome {
        match settled {
            Err(panic) => RunOutcome::HostFault {
                text: panic_message(panic.as_ref()),
            },
            Ok(Err(fault)) => RunOutcome::HostFault {
                text: format!("{fault:#}"),
            },
            Ok(Ok(Completion { error: Some(err), .. }))
                if err.is_cancellation() || session.signal().is_raised() =>
            {
                RunOutcome::Cancelled {
                    text: err.render().to_string(),
                }
            }
            Ok(Ok(Completion { error: Some(err), .. })) => RunOutcome::Failed {
                text: err.render().to_string(),
            },
            Ok(Ok(Completion { value, error: None })) => RunOutcome::Completed { value },
        }
    }

    /// Every settle path leaves the console on a fresh line.
    fn publish(&self, outcome: &RunOutcome) {
        let output = &self.inner.output;
        output.terminate_line();

        match outcome {
            RunOutcome::Completed { .. } => {}
            RunOutcome::Failed { text } => {
                output.append(text);
                output.terminate_line();
            }
            RunOutcome::Cancelled { text } => {
                let text = if text.trim().is_empty() {
                    self.inner.config.stopped_message.as_str()
                } else {
                    text.as_str()
                };
                output.append(text);
                output.terminate_line();
            }
            RunOutcome::HostFault { text } => {
                tracing::error!(fault = %text, "computation faulted");
                output.append(&format!("{}{}", self.inner.config.host_fault_prefix, text));
                output.terminate_line();
            }
        }
    }

    fn emit(&self, event: ConsoleEvent) {
        let _ = self.inner.events.send(event);
    }

    fn live_session(&self) -> Option<Arc<SessionContext>> {
        self.lock_live().session.clone()
    }

    fn lock_live(&self) -> MutexGuard<'_, Live> {
        self.inner.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Text of a panic payload, for payloads raised with a message.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string panic payload>".to_string())
}
