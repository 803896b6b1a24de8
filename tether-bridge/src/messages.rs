//! Message enum.

use tether_core::ConsoleEvent;

#[derive(Clone, Debug)]
pub enum Message {
    // ── Run control ──
    Run,
    Stop,
    /// Ctrl+C: echo `^C` and stop, unless a line is being typed.
    Interrupt,
    ClearOutput,
    Quit,

    // ── Input line ──
    InputChar(char),
    /// Tab inserts four spaces.
    Indent,
    Backspace,
    Commit,

    // ── View ──
    ScrollUp,
    ScrollDown,
    Resized(u16, u16),

    /// Something changed inside the console.
    Console(ConsoleEvent),
}
