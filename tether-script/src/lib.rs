//! # Tether Script
//!
//! A small line-oriented teaching language, hosted by the console as its
//! built-in computation.
//!
//! ```text
//! input n "How many? "
//! for i = 1 to n do
//!   if i % 2 == 0 then print i, "is even" else print i, "is odd" end
//! end
//! ```

use async_trait::async_trait;
use tether_core::{Completion, Computation, ComputationError, ConsoleIo, SessionId};

pub mod ast;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use error::{ErrorKind, Position, ScriptError};
pub use interpreter::{Halt, Interpreter};
pub use parser::parse;
pub use value::Value;

/// Name shown in diagnostics when the source did not come from a file.
pub const DEFAULT_FILE_NAME: &str = "<program>";

/// Runs tether-script source as a console computation.
#[derive(Debug, Clone)]
pub struct ScriptComputation {
    file_name: String,
}

impl Default for ScriptComputation {
    fn default() -> Self {
        Self::new(DEFAULT_FILE_NAME)
    }
}

impl ScriptComputation {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

#[async_trait]
impl Computation for ScriptComputation {
    async fn run(
        &self,
        session: SessionId,
        source: &str,
        io: ConsoleIo,
    ) -> anyhow::Result<Completion> {
        let program = match parse(source) {
            Ok(program) => program,
            Err(err) => {
                tracing::debug!(%session, error = %err, "script rejected");
                return Ok(Completion::failed(ComputationError::new(
                    err.render(&self.file_name, source),
                )));
            }
        };
        tracing::debug!(%session, statements = program.body.len(), "script parsed");

        let mut interpreter = Interpreter::new(&io);
        match interpreter.run(&program).await {
            Ok(()) => Ok(Completion::ok(None)),
            Err(Halt::Error(err)) => Ok(Completion::failed(ComputationError::new(
                err.render(&self.file_name, source),
            ))),
            // The console supplies its own stop message.
            Err(Halt::Stopped) => Ok(Completion::failed(ComputationError::cancelled(""))),
            Err(Halt::Detached(err)) => Err(anyhow::Error::new(err).context("input channel lost")),
        }
    }
}
