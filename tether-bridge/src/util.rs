use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use directories::ProjectDirs;
use tether_core::panic_message;
use tracing_subscriber::EnvFilter;

/// `<data dir>/tether/tether.log`, or the temp dir on platforms without one.
pub fn default_log_path() -> PathBuf {
    ProjectDirs::from("dev", "tether", "tether")
        .map(|dirs| dirs.data_local_dir().join("tether.log"))
        .unwrap_or_else(|| std::env::temp_dir().join("tether.log"))
}

/// Log to a file: stdout and stderr belong to the terminal UI.
///
/// `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str, log_file: &Path) -> anyhow::Result<()> {
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("opening log file {}", log_file.display()))?;

    // RUST_LOG=tether_core=debug,tether_script=debug
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .compact()
        .try_init();
    Ok(())
}

/// Send panics to the log. Raw mode and the alternate screen would hide a
/// message printed to stderr.
///
/// Panics inside a run also land here before the run controller reports
/// them as host faults.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let message = panic_message(info.payload());
        let location = info
            .location()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<unknown>".to_string());
        let thread = std::thread::current();

        tracing::error!(
            target: "tether::panic",
            thread = thread.name().unwrap_or("<unnamed>"),
            %location,
            %message,
            "panicked"
        );
    }));
}
