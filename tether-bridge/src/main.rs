use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{Event, EventStream};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{self, ClearType};
use crossterm::{execute, queue};
use futures::StreamExt;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use tether_bridge::app::ConsoleApp;
use tether_bridge::cli::Cli;
use tether_bridge::messages::Message;
use tether_bridge::update::update;
use tether_bridge::{headless, keyboard, util, view_ui};
use tether_core::{ConsoleConfig, ConsoleEvent, RunController};
use tether_script::ScriptComputation;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = ConsoleConfig::load(cli.config.as_deref());

    let log_file = cli.log_file.clone().unwrap_or_else(util::default_log_path);
    util::init_tracing(&config.log_filter, &log_file)?;
    util::install_panic_hook();

    let source = match &cli.script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?,
        None => String::new(),
    };
    let script_name = cli.script_name();
    tracing::info!(script = %script_name, eval = cli.eval, "tether starting");

    let computation = Arc::new(ScriptComputation::new(script_name.clone()));
    let controller = RunController::new(config, computation);

    if cli.eval {
        let stopper = controller.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                stopper.stop();
            }
        });

        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let report = headless::run_headless(&controller, source, stdin, &mut io::stdout()).await?;
        return Ok(if report.outcome.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let mut app = ConsoleApp::new(controller, source, script_name);
    run_tui(&mut app).await?;
    tracing::info!("tether exiting");
    Ok(ExitCode::SUCCESS)
}

// ────────────────────────────────────────────────────────────────
// Terminal UI
// ────────────────────────────────────────────────────────────────

async fn run_tui(app: &mut ConsoleApp) -> anyhow::Result<()> {
    let mut stdout = io::stdout();

    terminal::enable_raw_mode()?;
    execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;
    if let Ok(size) = terminal::size() {
        app.size = size;
    }

    let result = event_loop(app, &mut stdout).await;

    // Restore the terminal even when the loop failed.
    let restored = execute!(stdout, cursor::Show, terminal::LeaveAlternateScreen)
        .and_then(|()| terminal::disable_raw_mode());
    result?;
    restored?;
    Ok(())
}

async fn event_loop(app: &mut ConsoleApp, out: &mut impl Write) -> anyhow::Result<()> {
    let mut keys = EventStream::new();
    let mut console = app.controller.subscribe();
    draw(app, out)?;

    while !app.should_quit {
        let message = tokio::select! {
            next = keys.next() => match next {
                Some(Ok(Event::Key(key))) => keyboard::map_key(&key),
                Some(Ok(Event::Resize(width, height))) => Some(Message::Resized(width, height)),
                Some(Ok(_)) => None,
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            event = console.recv() => match event {
                Ok(event) => Some(Message::Console(event)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "console events lagged");
                    Some(Message::Console(ConsoleEvent::OutputChanged))
                }
                Err(RecvError::Closed) => break,
            },
        };

        if let Some(message) = message {
            update(app, message);
        }

        // Coalesce bursts of output into one repaint.
        loop {
            match console.try_recv() {
                Ok(event) => update(app, Message::Console(event)),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        draw(app, out)?;
    }
    Ok(())
}

fn draw(app: &ConsoleApp, out: &mut impl Write) -> io::Result<()> {
    let frame = view_ui::view(app);
    let status_row = app.size.1.saturating_sub(1);

    queue!(out, cursor::Hide, terminal::Clear(ClearType::All))?;
    for (row, text) in (0u16..).zip(&frame.rows) {
        queue!(out, cursor::MoveTo(0, row), Print(text))?;
    }
    queue!(
        out,
        cursor::MoveTo(0, status_row),
        SetAttribute(Attribute::Reverse),
        Print(&frame.status),
        SetAttribute(Attribute::Reset)
    )?;
    if let Some((col, row)) = frame.cursor {
        queue!(out, cursor::MoveTo(col, row), cursor::Show)?;
    }
    out.flush()
}
