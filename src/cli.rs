// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `tickdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tickdag",
    version,
    about = "Run prioritised, dependency-aware jobs on cron and interval triggers.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the schedule file (TOML).
    ///
    /// A default schedule is written here if the file does not exist.
    /// Defaults to `Tickdag.toml` in the current directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Number of worker executors; overrides `[scheduler].workers`.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Directory for persisted completion records; overrides
    /// `[scheduler].state_dir`.
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TICKDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print jobs with their next fire time, run nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
