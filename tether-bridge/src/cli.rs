//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "tether", version, about = "Run a script against an interactive console")]
pub struct Cli {
    /// Script to load. Without one the console starts with an empty program.
    pub script: Option<PathBuf>,

    /// Config file (defaults to the platform config directory).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Where to write the log.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Run the script once over stdin/stdout instead of opening the UI.
    #[arg(long, requires = "script")]
    pub eval: bool,
}

impl Cli {
    /// Name used in the status bar and in diagnostics.
    pub fn script_name(&self) -> String {
        self.script
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| tether_script::DEFAULT_FILE_NAME.to_string())
    }
}
