//! Script diagnostics.
//!
//! Every error carries the span it complains about so it can be printed the
//! way learners expect:
//!
//! ```text
//! Runtime Error: Division by 0
//! File <program>, line 3
//!
//! print 10 / 0
//!            ^
//! ```

use thiserror::Error;

/// A point in the source text. `ln` and `col` are zero-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub idx: usize,
    pub ln: usize,
    pub col: usize,
}

impl Position {
    /// Step past `ch`.
    pub fn advance(&mut self, ch: char) {
        self.idx += ch.len_utf8();
        if ch == '\n' {
            self.ln += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    IllegalCharacter,
    ExpectedCharacter,
    InvalidSyntax,
    Runtime,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::IllegalCharacter => "Illegal Character",
            ErrorKind::ExpectedCharacter => "Expected Character",
            ErrorKind::InvalidSyntax => "Invalid Syntax",
            ErrorKind::Runtime => "Runtime Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {details}", kind.name())]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub details: String,
    pub start: Position,
    pub end: Position,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, details: impl Into<String>, start: Position, end: Position) -> Self {
        Self {
            kind,
            details: details.into(),
            start,
            end,
        }
    }

    pub fn illegal_char(details: impl Into<String>, start: Position, end: Position) -> Self {
        Self::new(ErrorKind::IllegalCharacter, details, start, end)
    }

    pub fn expected_char(details: impl Into<String>, start: Position, end: Position) -> Self {
        Self::new(ErrorKind::ExpectedCharacter, details, start, end)
    }

    pub fn syntax(details: impl Into<String>, start: Position, end: Position) -> Self {
        Self::new(ErrorKind::InvalidSyntax, details, start, end)
    }

    pub fn runtime(details: impl Into<String>, start: Position, end: Position) -> Self {
        Self::new(ErrorKind::Runtime, details, start, end)
    }

    /// Full learner-facing report against the program text.
    pub fn render(&self, file_name: &str, source: &str) -> String {
        format!(
            "{self}\nFile {file_name}, line {}\n\n{}",
            self.start.ln + 1,
            underline(source, self.start, self.end)
        )
    }
}

/// The offending source line with a caret run beneath the span.
fn underline(source: &str, start: Position, end: Position) -> String {
    let line = source.lines().nth(start.ln).unwrap_or("");
    let line_len = line.chars().count();

    let col_end = if start.ln == end.ln { end.col } else { line_len };
    let width = col_end.saturating_sub(start.col).max(1);

    format!(
        "{}\n{}{}",
        line.replace('\t', ""),
        " ".repeat(start.col),
        "^".repeat(width)
    )
}
