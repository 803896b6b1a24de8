//! Keyboard dispatch.
//!
//! Ctrl+C is the keyboard interrupt, never copy: a raw-mode terminal gets
//! no SIGINT, so this map is the only way to break a runaway loop besides
//! Ctrl+X.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::messages::Message;

pub fn map_key(key: &KeyEvent) -> Option<Message> {
    // Windows reports releases too.
    if key.kind == KeyEventKind::Release {
        return None;
    }

    // ── Ctrl combos ──
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char(c) => match c.to_ascii_lowercase() {
                'r' => Some(Message::Run),
                'x' => Some(Message::Stop),
                'c' => Some(Message::Interrupt),
                'l' => Some(Message::ClearOutput),
                'q' => Some(Message::Quit),
                _ => None,
            },
            _ => None,
        };
    }

    // ── Bare keys ──
    match key.code {
        KeyCode::F(5) => Some(Message::Run),
        KeyCode::F(6) => Some(Message::Stop),
        KeyCode::Enter => Some(Message::Commit),
        KeyCode::Backspace => Some(Message::Backspace),
        KeyCode::Tab => Some(Message::Indent),
        KeyCode::PageUp => Some(Message::ScrollUp),
        KeyCode::PageDown => Some(Message::ScrollDown),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::ALT) => {
            Some(Message::InputChar(c))
        }
        _ => None,
    }
}
