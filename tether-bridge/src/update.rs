//! Update logic, the central message handler.
//!
//! Must be called from inside a tokio runtime: `Run` spawns the session.

use tether_core::{ConsoleEvent, RunState};

use crate::app::{ConsoleApp, SCROLL_STEP};
use crate::messages::Message;

pub fn update(app: &mut ConsoleApp, message: Message) {
    match message {
        // ────────────────────────────────────────────────────
        // Run control
        // ────────────────────────────────────────────────────
        Message::Run => {
            if app.state() != RunState::Idle {
                tracing::debug!("run ignored: already running");
                return;
            }
            app.input.clear();
            app.scroll = 0;
            // The outcome arrives as `ConsoleEvent::RunFinished`.
            drop(app.controller.spawn(app.source.clone()));
        }

        Message::Stop => {
            app.controller.stop();
        }

        Message::Interrupt => {
            if app.controller.interrupt() {
                app.input.clear();
            }
        }

        Message::ClearOutput => {
            if app.state() == RunState::Idle {
                app.controller.clear_output();
                app.scroll = 0;
            }
        }

        Message::Quit => {
            app.controller.stop();
            app.should_quit = true;
        }

        // ────────────────────────────────────────────────────
        // Input line (only live while a request is pending)
        // ────────────────────────────────────────────────────
        Message::InputChar(c) => {
            if app.controller.is_awaiting_input() {
                app.input.push(c);
                app.scroll = 0;
            }
        }

        Message::Indent => {
            if app.controller.is_awaiting_input() {
                app.input.push_str("    ");
            }
        }

        Message::Backspace => {
            app.input.pop();
        }

        Message::Commit => {
            if app.controller.is_awaiting_input() {
                let line = std::mem::take(&mut app.input);
                app.controller.submit_line(&line);
                app.scroll = 0;
            }
        }

        // ────────────────────────────────────────────────────
        // View
        // ────────────────────────────────────────────────────
        Message::ScrollUp => {
            app.scroll = app.scroll.saturating_add(SCROLL_STEP);
        }

        Message::ScrollDown => {
            app.scroll = app.scroll.saturating_sub(SCROLL_STEP);
        }

        Message::Resized(width, height) => {
            app.size = (width, height);
        }

        Message::Console(event) => match event {
            ConsoleEvent::RunFinished(report) => {
                app.last_report = Some(report);
            }
            ConsoleEvent::InputSettled => {
                // A cancelled request takes its half-typed line with it.
                if !app.controller.is_awaiting_input() {
                    app.input.clear();
                }
            }
            ConsoleEvent::StateChanged(RunState::Idle) => {
                app.input.clear();
            }
            ConsoleEvent::OutputChanged
            | ConsoleEvent::InputRequested { .. }
            | ConsoleEvent::StateChanged(_) => {}
        },
    }
}
