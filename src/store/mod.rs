// src/store/mod.rs

//! Durable result storage.
//!
//! Layout on disk, one file per run:
//!
//! ```text
//! <log_dir>/<command id>/<YYYY-MM-DD_HH-MM-SS>/result.json
//! ```
//!
//! Every state transition of a run rewrites its record in full, so the
//! newest write always wins and a reload reconstructs an equivalent
//! result. Persistence failures are logged and never fatal; the in-memory
//! state stays authoritative for the running session.

pub mod cache;
pub mod record;

use std::fs;
use std::path::PathBuf;

use chrono::{Local, TimeZone};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::CommandResult;

pub use cache::ResultCache;
pub use record::{RunRecord, RECORD_FILE_NAME, RECORD_VERSION};

#[derive(Debug, Clone)]
pub struct ResultStore {
    base: PathBuf,
}

impl ResultStore {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    /// Directory holding the record for one run.
    pub fn run_dir(&self, id: &str, timestamp: i64) -> PathBuf {
        self.base.join(id).join(format_run_dir(timestamp))
    }

    /// Write the full record for a run, creating directories as needed.
    pub fn save(&self, result: &CommandResult) -> Result<()> {
        let dir = self.run_dir(&result.id, result.timestamp);
        fs::create_dir_all(&dir)?;

        let record = RunRecord::from_result(result);
        let json = serde_json::to_string_pretty(&record)?;
        fs::write(dir.join(RECORD_FILE_NAME), json)?;
        Ok(())
    }

    /// Scan all persisted runs, newest first, capped at `cap`.
    ///
    /// Unreadable or unparsable records are skipped with a warning; a
    /// missing base directory yields an empty history. Stale "running"
    /// records are reconciled during rehydration (see [`RunRecord`]).
    pub fn load_recent(&self, cap: usize) -> Vec<CommandResult> {
        let mut results = Vec::new();

        let command_dirs = match fs::read_dir(&self.base) {
            Ok(entries) => entries,
            Err(_) => return results,
        };

        for command_entry in command_dirs.flatten() {
            if !command_entry.path().is_dir() {
                continue;
            }
            let run_dirs = match fs::read_dir(command_entry.path()) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = ?command_entry.path(), error = %err, "skipping unreadable command directory");
                    continue;
                }
            };

            for run_entry in run_dirs.flatten() {
                let record_path = run_entry.path().join(RECORD_FILE_NAME);
                if !record_path.is_file() {
                    continue;
                }
                match read_record(&record_path) {
                    Ok(record) => results.push(record.into_result()),
                    Err(err) => {
                        warn!(path = ?record_path, error = %err, "skipping unparsable run record");
                    }
                }
            }
        }

        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        results.truncate(cap);
        debug!(count = results.len(), "loaded recent results");
        results
    }
}

fn read_record(path: &std::path::Path) -> Result<RunRecord> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Human-readable run directory name derived from the start timestamp,
/// formatted in local time.
fn format_run_dir(timestamp: i64) -> String {
    match Local.timestamp_millis_opt(timestamp).single() {
        Some(dt) => dt.format("%Y-%m-%d_%H-%M-%S").to_string(),
        None => timestamp.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{command_id, run_id_for, CommandResult, ExitStatus};

    fn terminal_result(command: &str, timestamp: i64, exit: ExitStatus) -> CommandResult {
        let id = command_id(command);
        let run_id = run_id_for(&id, timestamp);
        CommandResult {
            id,
            run_id,
            command: command.to_string(),
            output: "out\n".to_string(),
            timestamp,
            is_running: false,
            exit: Some(exit),
            schedule_id: None,
            execution_time_ms: Some(5),
        }
    }

    #[test]
    fn save_then_load_reconstructs_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().to_path_buf());

        let a = terminal_result("echo a", 1_700_000_000_000, ExitStatus::Exited(0));
        let b = terminal_result("echo b", 1_700_000_060_000, ExitStatus::Exited(1));
        store.save(&a).unwrap();
        store.save(&b).unwrap();

        let loaded = store.load_recent(50);
        assert_eq!(loaded.len(), 2);
        // Newest first.
        assert_eq!(loaded[0].command, "echo b");
        assert_eq!(loaded[0].exit, Some(ExitStatus::Exited(1)));
        assert_eq!(loaded[1].command, "echo a");
        assert_eq!(loaded[1].run_id, a.run_id);
    }

    #[test]
    fn load_caps_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().to_path_buf());

        for i in 0..6 {
            let r = terminal_result(
                &format!("echo {i}"),
                1_700_000_000_000 + i * 60_000,
                ExitStatus::Exited(0),
            );
            store.save(&r).unwrap();
        }

        let loaded = store.load_recent(4);
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded[0].command, "echo 5");
        assert_eq!(loaded[3].command, "echo 2");
    }

    #[test]
    fn running_record_is_reconciled_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().to_path_buf());

        let id = command_id("sleep 60");
        let running = CommandResult::started(
            id.clone(),
            run_id_for(&id, 1_700_000_000_000),
            "sleep 60".to_string(),
            1_700_000_000_000,
            None,
        );
        store.save(&running).unwrap();

        let loaded = store.load_recent(50);
        assert_eq!(loaded.len(), 1);
        assert!(!loaded[0].is_running);
        assert_eq!(loaded[0].exit, Some(ExitStatus::Abnormal));
    }

    #[test]
    fn missing_base_dir_yields_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("does-not-exist"));
        assert!(store.load_recent(50).is_empty());
    }

    #[test]
    fn corrupt_record_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().to_path_buf());

        let good = terminal_result("echo ok", 1_700_000_000_000, ExitStatus::Exited(0));
        store.save(&good).unwrap();

        let bad_dir = dir.path().join("cmd-bad").join("2026-01-01_00-00-00");
        std::fs::create_dir_all(&bad_dir).unwrap();
        std::fs::write(bad_dir.join(RECORD_FILE_NAME), "{ not json").unwrap();

        let loaded = store.load_recent(50);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].command, "echo ok");
    }
}
