//! Output buffer.
//!
//! Text written by the computation lands here as a sequence of numbered
//! lines. The last line stays "open" until a terminator closes it, so a
//! prompt written with `write("n=")` and the echo of the user's answer end
//! up on the same row.
//!
//! `OutputBuffer` is pure data. `SharedOutput` wraps it for the run
//! controller and notifies the presentation layer after every mutation.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

use crate::ConsoleEvent;

/// One row of terminal output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// 1-based, reset only by `clear()`.
    pub ordinal: usize,
    pub text: String,
    /// A closed line is immutable.
    pub closed: bool,
}

#[derive(Debug, Default, Clone)]
pub struct OutputBuffer {
    lines: Vec<Line>,
    last_ordinal: usize,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append computation output, splitting on `\n`.
    pub fn append(&mut self, text: &str) {
        let mut segments = text.split('\n').peekable();

        while let Some(segment) = segments.next() {
            if !segment.is_empty() {
                match self.open_line_mut() {
                    Some(line) => line.text.push_str(segment),
                    None => self.push_line(segment.to_string(), false),
                }
            }

            // Every segment but the last was followed by a terminator.
            if segments.peek().is_some() {
                match self.open_line_mut() {
                    Some(line) => {
                        if line.text.ends_with('\r') {
                            line.text.pop();
                        }
                        line.closed = true;
                    }
                    None => self.push_line(String::new(), true),
                }
            }
        }
    }

    /// Discard every line and restart numbering. Idempotent.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.last_ordinal = 0;
    }

    /// Snapshot of the current lines.
    pub fn render(&self) -> Vec<Line> {
        self.lines.clone()
    }

    /// Lines numbered `ordinal` and later. Ordinals run 1, 2, 3... without
    /// gaps, so this is a slice from the tail.
    pub fn render_from(&self, ordinal: usize) -> Vec<Line> {
        self.lines
            .get(ordinal.saturating_sub(1)..)
            .map(<[Line]>::to_vec)
            .unwrap_or_default()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True when the last line has not been terminated yet.
    pub fn is_line_open(&self) -> bool {
        self.lines.last().is_some_and(|l| !l.closed)
    }

    /// Rebuild the transcript: every closed line contributes its text plus
    /// a terminator, the open line (if any) just its text.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            if line.closed {
                out.push('\n');
            }
        }
        out
    }

    fn open_line_mut(&mut self) -> Option<&mut Line> {
        self.lines.last_mut().filter(|l| !l.closed)
    }

    fn push_line(&mut self, text: String, closed: bool) {
        self.last_ordinal += 1;
        self.lines.push(Line {
            ordinal: self.last_ordinal,
            text,
            closed,
        });
    }
}

// ────────────────────────────────────────────────────────────────
// Shared handle
// ────────────────────────────────────────────────────────────────

/// The buffer as seen by the run controller, the computation's `write`
/// capability and the UI. Cloning shares the same buffer.
#[derive(Debug, Clone)]
pub struct SharedOutput {
    buffer: Arc<Mutex<OutputBuffer>>,
    events: broadcast::Sender<ConsoleEvent>,
}

impl SharedOutput {
    pub fn new(events: broadcast::Sender<ConsoleEvent>) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(OutputBuffer::new())),
            events,
        }
    }

    pub fn append(&self, text: &str) {
        self.lock().append(text);
        // Even an empty append asks the host to re-measure its scroll.
        let _ = self.events.send(ConsoleEvent::OutputChanged);
    }

    pub fn clear(&self) {
        self.lock().clear();
        let _ = self.events.send(ConsoleEvent::OutputChanged);
    }

    /// Close the open line, if any.
    pub fn terminate_line(&self) {
        let open = self.lock().is_line_open();
        if open {
            self.append("\n");
        }
    }

    pub fn render(&self) -> Vec<Line> {
        self.lock().render()
    }

    pub fn render_from(&self, ordinal: usize) -> Vec<Line> {
        self.lock().render_from(ordinal)
    }

    pub fn text(&self) -> String {
        self.lock().text()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_line_open(&self) -> bool {
        self.lock().is_line_open()
    }

    fn lock(&self) -> MutexGuard<'_, OutputBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
