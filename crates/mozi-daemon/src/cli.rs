//! Command-line surface for the `mozid` binary.

use clap::Parser;

/// Run the mozi runtime kernel daemon.
#[derive(Parser, Debug)]
#[command(name = "mozid")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workspace root to load `.mozi/config.toml` from, if present.
    #[arg(short, long)]
    pub workspace: Option<std::path::PathBuf>,

    /// Base tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit newline-delimited JSON logs instead of the pretty default.
    #[arg(long)]
    pub json_logs: bool,
}
