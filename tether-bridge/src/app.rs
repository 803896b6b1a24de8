//! Application state.

use tether_core::{RunController, RunReport, RunState};

/// Rows moved per PageUp/PageDown.
pub const SCROLL_STEP: usize = 10;

/// The visible input line while the computation is blocked on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLine {
    pub prompt: String,
    pub text: String,
}

pub struct ConsoleApp {
    pub controller: RunController,

    /// Program text handed to the computation on Run.
    pub source: String,
    /// Shown in the status bar and in diagnostics.
    pub script_name: String,

    /// Text typed into the input line so far.
    pub input: String,
    /// Rows scrolled back from the tail; 0 follows new output.
    pub scroll: usize,
    pub size: (u16, u16),

    pub last_report: Option<RunReport>,
    pub should_quit: bool,
}

impl ConsoleApp {
    pub fn new(controller: RunController, source: String, script_name: String) -> Self {
        Self {
            controller,
            source,
            script_name,
            input: String::new(),
            scroll: 0,
            size: (80, 24),
            last_report: None,
            should_quit: false,
        }
    }

    pub fn state(&self) -> RunState {
        self.controller.state()
    }

    /// `Some` exactly while the computation waits on a line.
    pub fn input_line(&self) -> Option<InputLine> {
        self.controller.pending_prompt().map(|prompt| InputLine {
            prompt,
            text: self.input.clone(),
        })
    }

    /// Short summary of the previous run for the status bar.
    pub fn last_summary(&self) -> Option<String> {
        self.last_report
            .as_ref()
            .map(|r| format!("last: {} in {}ms", r.outcome.label(), r.duration_ms))
    }
}
