//! View rendering.
//!
//! `render` is pure: output lines, input-line state and status in, a frame
//! description out. `main.rs` paints the frame with crossterm.

use tether_core::{Line, RunState};

use crate::app::{ConsoleApp, InputLine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Body rows, top to bottom, already clipped to the width.
    pub rows: Vec<String>,
    /// Bottom row.
    pub status: String,
    /// Where the caret goes, as (column, row). `None` hides it.
    pub cursor: Option<(u16, u16)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub state: RunState,
    pub script: String,
    pub last: Option<String>,
}

impl StatusLine {
    fn text(&self, width: usize) -> String {
        let mut text = format!(" {} | {}", self.state.label(), self.script);
        if let Some(last) = &self.last {
            text.push_str(" | ");
            text.push_str(last);
        }
        let hint = match self.state {
            RunState::Idle => "Ctrl+R run  Ctrl+L clear  Ctrl+Q quit ",
            _ => "Ctrl+X stop  Ctrl+C interrupt ",
        };
        let used = text.chars().count();
        let hint_len = hint.chars().count();
        if used + hint_len < width {
            text.push_str(&" ".repeat(width - used - hint_len));
            text.push_str(hint);
        }
        // The bar spans the full width.
        let used = text.chars().count();
        if used < width {
            text.push_str(&" ".repeat(width - used));
        }
        clip(&text, width)
    }
}

pub fn render(
    lines: &[Line],
    input: Option<&InputLine>,
    status: &StatusLine,
    scroll: usize,
    width: u16,
    height: u16,
) -> Frame {
    let width = usize::from(width);
    let body = usize::from(height.saturating_sub(1));

    let mut rows: Vec<String> = lines.iter().map(|l| l.text.clone()).collect();
    let mut input_row = None;

    if let Some(input) = input {
        let typed = format!("{}{}", input.prompt, input.text);
        // Answer on the same row as a prompt the program wrote itself.
        let inline = lines.last().is_some_and(|l| !l.closed && !l.text.is_empty());
        match rows.last_mut() {
            Some(row) if inline => row.push_str(&typed),
            _ => rows.push(typed),
        }
        input_row = Some(rows.len() - 1);
    }

    let scroll = scroll.min(rows.len().saturating_sub(body));
    let end = rows.len() - scroll;
    let start = end.saturating_sub(body);

    let cursor = input_row
        .filter(|row| (start..end).contains(row))
        .and_then(|row| {
            let col = rows[row].chars().count().min(width.saturating_sub(1));
            Some((u16::try_from(col).ok()?, u16::try_from(row - start).ok()?))
        });

    Frame {
        rows: rows[start..end].iter().map(|r| clip(r, width)).collect(),
        status: status.text(width),
        cursor,
    }
}

/// Render straight from the application state.
pub fn view(app: &ConsoleApp) -> Frame {
    let status = StatusLine {
        state: app.state(),
        script: app.script_name.clone(),
        last: app.last_summary(),
    };
    render(
        &app.controller.render(),
        app.input_line().as_ref(),
        &status,
        app.scroll,
        app.size.0,
        app.size.1,
    )
}

fn clip(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}
