//! One-shot runs over plain streams (`tether --eval`).
//!
//! Output is streamed as it grows, the prompt of each pending request is
//! printed, and the next line of `input` answers it. End of input stops
//! the run.

use std::io::Write;

use anyhow::Context;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast::error::RecvError;

use tether_core::{ConsoleEvent, RunController, RunReport};

pub async fn run_headless<R, W>(
    controller: &RunController,
    source: String,
    input: R,
    out: &mut W,
) -> anyhow::Result<RunReport>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut events = controller.subscribe();
    let mut lines = input.lines();
    let mut printed = Progress::default();
    let mut run = controller.spawn(source);
    let mut events_open = true;

    loop {
        tokio::select! {
            joined = &mut run => {
                let report = joined.context("run task failed")??;
                flush_output(controller, &mut printed, out)?;
                return Ok(report);
            }
            event = events.recv(), if events_open => match event {
                Ok(ConsoleEvent::InputRequested { prompt }) => {
                    flush_output(controller, &mut printed, out)?;
                    write!(out, "{prompt}")?;
                    out.flush()?;

                    match lines.next_line().await? {
                        Some(line) => {
                            controller.supply(line);
                        }
                        None => {
                            tracing::info!("input closed while a request was pending; stopping");
                            controller.stop();
                        }
                    }
                }
                Ok(ConsoleEvent::OutputChanged) | Err(RecvError::Lagged(_)) => {
                    flush_output(controller, &mut printed, out)?;
                }
                Err(RecvError::Closed) => events_open = false,
                Ok(_) => {}
            },
        }
    }
}

/// How far into the buffer stdout has got.
#[derive(Debug, Clone, Copy)]
struct Progress {
    /// Ordinal of the first line not yet finished on stdout.
    line: usize,
    /// Bytes of that line's text already written.
    bytes: usize,
}

impl Default for Progress {
    fn default() -> Self {
        Self { line: 1, bytes: 0 }
    }
}

/// Write whatever the buffer gained since the last call.
///
/// Only lines from the unfinished one onward are fetched. A trailing `\r`
/// on the open line is held back: the buffer drops it if a `\n` follows.
fn flush_output<W: Write>(
    controller: &RunController,
    progress: &mut Progress,
    out: &mut W,
) -> std::io::Result<()> {
    let output = controller.output();
    if output.len() + 1 < progress.line {
        // Cleared under us; numbering restarted.
        *progress = Progress::default();
    }

    for line in output.render_from(progress.line) {
        let text = if line.closed {
            line.text.as_str()
        } else {
            line.text.strip_suffix('\r').unwrap_or(&line.text)
        };
        if let Some(fresh) = text.get(progress.bytes..) {
            out.write_all(fresh.as_bytes())?;
        }

        if line.closed {
            out.write_all(b"\n")?;
            progress.line = line.ordinal + 1;
            progress.bytes = 0;
        } else {
            progress.bytes = text.len();
        }
    }
    out.flush()
}
