// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `cronrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cronrun",
    version,
    about = "Run shell commands on demand or on a cron schedule, with a durable run history.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// When omitted, built-in defaults are used (data under the platform
    /// user-data directory).
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CRONRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Execute a single command, streaming its output, then exit with the
    /// command's exit code.
    Run {
        /// The command line to execute (passed to the platform shell).
        command: String,

        /// Kill the command if it has not finished after this many ms.
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },

    /// Arm all enabled schedules and run until Ctrl-C.
    Serve,

    /// Manage schedules.
    #[command(subcommand)]
    Schedule(ScheduleCommand),
}

#[derive(Debug, Clone, Subcommand)]
pub enum ScheduleCommand {
    /// List all schedules.
    List,

    /// Add a new schedule.
    Add {
        /// Human-readable schedule name.
        #[arg(long)]
        name: String,

        /// Five-field cron expression (minute hour day-of-month month day-of-week).
        #[arg(long, value_name = "EXPR")]
        cron: String,

        /// The command line to execute on each fire.
        command: String,

        /// Per-execution timeout in ms.
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Create the schedule disabled.
        #[arg(long)]
        disabled: bool,
    },

    /// Remove a schedule by id.
    Remove { id: String },

    /// Enable a schedule by id.
    Enable { id: String },

    /// Disable a schedule by id.
    Disable { id: String },
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
