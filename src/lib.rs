// src/lib.rs

//! cronrun: run shell commands on demand or on a cron schedule, with a
//! durable per-run history.
//!
//! The crate is split into two halves wired together by [`App`]:
//!
//! - [`exec`] supervises command processes: duplicate prevention, output
//!   streaming, timeouts, manual kills, and the bounded result cache
//!   backed by [`store`].
//! - [`schedule`] owns cron schedules and their timers, triggering the
//!   command manager on each fire.

use std::io::Write;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod schedule;
pub mod store;
pub mod types;

pub use errors::{CronrunError, Error, Result};

use cli::{CliArgs, CliCommand, ScheduleCommand};
use config::Config;
use exec::CommandManager;
use schedule::store::ScheduleStore;
use schedule::{CronScheduler, NewSchedule, ScheduleOptions};
use store::ResultStore;
use types::ExecutionOptions;

/// The wired-up application: one command manager, one scheduler on top.
pub struct App {
    pub manager: CommandManager,
    pub scheduler: CronScheduler,
}

impl App {
    /// Build both halves from a resolved config, loading persisted history
    /// and schedules, and arm every enabled schedule.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &Config) -> Self {
        let manager = CommandManager::new(ResultStore::new(config.log_dir()), config.max_results);
        let scheduler = CronScheduler::new(
            manager.clone(),
            ScheduleStore::new(config.schedule_dir()),
        );
        Self { manager, scheduler }
    }
}

/// Run the CLI to completion, returning the process exit code.
pub async fn run(args: CliArgs) -> anyhow::Result<i32> {
    let config = config::load_or_default(args.config.as_deref())?;

    match args.command {
        CliCommand::Run {
            command,
            timeout_ms,
        } => run_once(&config, &command, timeout_ms).await,
        CliCommand::Serve => serve(&config).await,
        CliCommand::Schedule(cmd) => schedule_command(&config, cmd),
    }
}

/// Execute one command, streaming its output to stdout as it arrives, and
/// return the command's exit code.
async fn run_once(
    config: &Config,
    command: &str,
    timeout_ms: Option<u64>,
) -> anyhow::Result<i32> {
    let manager = CommandManager::new(ResultStore::new(config.log_dir()), config.max_results);

    // Subscribe before executing so no update can slip past.
    let mut updates = manager.subscribe();

    let initial = manager.execute(
        command,
        ExecutionOptions {
            timeout: timeout_ms.map(Duration::from_millis),
            schedule_id: None,
        },
    );

    if let Some(exit) = initial.exit {
        // Terminal before any process ran (duplicate rejection).
        println!("{}", initial.output);
        return Ok(exit.code());
    }

    let run_id = initial.run_id;
    let mut printed = 0usize;

    loop {
        match updates.recv().await {
            Ok(update) if update.run_id == run_id => {
                // Output is append-only, so printing the suffix past what
                // we already wrote streams it incrementally.
                if update.output.len() > printed {
                    print!("{}", &update.output[printed..]);
                    std::io::stdout().flush()?;
                    printed = update.output.len();
                }
                if !update.is_running {
                    return Ok(update.exit_code().unwrap_or(1));
                }
            }
            Ok(_) => {}
            // Updates are cumulative snapshots, so missed ones are
            // recovered by whichever arrives next.
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => {
                anyhow::bail!("command manager shut down before the command finished")
            }
        }
    }
}

/// Arm all enabled schedules and run until Ctrl-C.
async fn serve(config: &Config) -> anyhow::Result<i32> {
    let app = App::new(config);
    let enabled = app
        .scheduler
        .schedules()
        .iter()
        .filter(|s| s.enabled)
        .count();
    info!(enabled, "serving schedules; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(0)
}

fn schedule_command(config: &Config, cmd: ScheduleCommand) -> anyhow::Result<i32> {
    let app = App::new(config);

    match cmd {
        ScheduleCommand::List => {
            for s in app.scheduler.schedules() {
                let state = if s.enabled { "enabled" } else { "disabled" };
                println!("{}  {:8}  [{}]  {}  {}", s.id, state, s.cron_expression, s.name, s.command);
            }
        }

        ScheduleCommand::Add {
            name,
            cron,
            command,
            timeout_ms,
            disabled,
        } => {
            // Reject bad expressions up front rather than storing a
            // silently-disabled schedule.
            schedule::cron::validate(&cron)?;
            let schedule = app.scheduler.add(NewSchedule {
                name,
                command,
                cron_expression: cron,
                enabled: !disabled,
                options: ScheduleOptions { timeout_ms },
            });
            println!("added schedule {}", schedule.id);
        }

        ScheduleCommand::Remove { id } => {
            if !app.scheduler.remove(&id) {
                anyhow::bail!("no schedule with id {id}");
            }
            println!("removed schedule {id}");
        }

        ScheduleCommand::Enable { id } => match app.scheduler.set_enabled(&id, true) {
            Some(s) => println!("enabled schedule {} ({})", s.id, s.name),
            None => anyhow::bail!("no schedule with id {id}"),
        },

        ScheduleCommand::Disable { id } => match app.scheduler.set_enabled(&id, false) {
            Some(s) => println!("disabled schedule {} ({})", s.id, s.name),
            None => anyhow::bail!("no schedule with id {id}"),
        },
    }

    Ok(0)
}
