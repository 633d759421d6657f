// src/store/record.rs

//! Versioned on-disk form of a single run.
//!
//! The record is a fixed-schema JSON document. Field order mirrors the
//! historical layout: command, id, run id, timestamp, numeric status,
//! human status label, optional execution time, optional schedule id,
//! output block.

use serde::{Deserialize, Serialize};

use crate::types::{CommandResult, ExitStatus};

pub const RECORD_VERSION: u32 = 1;
pub const RECORD_FILE_NAME: &str = "result.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub version: u32,
    pub command: String,
    pub id: String,
    pub run_id: String,
    /// Start time, ms since epoch.
    pub timestamp: i64,
    /// Numeric status; absent while the run was still in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    pub status_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    pub output: String,
}

impl RunRecord {
    pub fn from_result(result: &CommandResult) -> Self {
        let status_label = if result.is_running {
            "Running".to_string()
        } else {
            result
                .exit
                .map(ExitStatus::label)
                .unwrap_or_else(|| "Unknown".to_string())
        };

        Self {
            version: RECORD_VERSION,
            command: result.command.clone(),
            id: result.id.clone(),
            run_id: result.run_id.clone(),
            timestamp: result.timestamp,
            status: if result.is_running {
                None
            } else {
                result.exit_code()
            },
            status_label,
            execution_time_ms: result.execution_time_ms,
            schedule_id: result.schedule_id.clone(),
            output: result.output.clone(),
        }
    }

    /// Rehydrate the in-memory result.
    ///
    /// A record with no status was still running when it was last written,
    /// meaning the process died without the manager observing completion
    /// (typically application shutdown). Such records come back terminal
    /// with [`ExitStatus::Abnormal`]; a more specific negative code, if one
    /// was recorded, is kept as-is.
    pub fn into_result(self) -> CommandResult {
        let exit = match self.status {
            None => ExitStatus::Abnormal,
            Some(code) => ExitStatus::from_code(code),
        };

        CommandResult {
            id: self.id,
            run_id: self.run_id,
            command: self.command,
            output: self.output,
            timestamp: self.timestamp,
            is_running: false,
            exit: Some(exit),
            schedule_id: self.schedule_id,
            execution_time_ms: self.execution_time_ms,
        }
    }
}
