// src/types.rs

//! Shared data contracts for command execution.

use std::time::Duration;

/// Semantic exit status of a command execution.
///
/// Native process exits keep their OS code; everything the manager decides
/// on its own (kills, timeouts, duplicate rejection, crash reconciliation)
/// gets a negative sentinel code so it survives persistence unambiguously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Process exited on its own with this native code (0 = success).
    Exited(i32),
    /// Terminated abnormally: the process died without the manager
    /// observing completion (also applied to stale "running" records found
    /// on reload). Code `-2`.
    Abnormal,
    /// Killed by the manager after the configured timeout elapsed. Code `-3`.
    TimedOut,
    /// Killed by explicit user request. Code `-4`.
    Killed,
    /// Rejected before spawn: the same command was already in flight. Code `-5`.
    Duplicate,
}

impl ExitStatus {
    /// Numeric form used in the durable record.
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Exited(code) => code,
            ExitStatus::Abnormal => -2,
            ExitStatus::TimedOut => -3,
            ExitStatus::Killed => -4,
            ExitStatus::Duplicate => -5,
        }
    }

    /// Inverse of [`code`](Self::code). Unknown negative codes are treated
    /// as plain native exits.
    pub fn from_code(code: i32) -> Self {
        match code {
            -2 => ExitStatus::Abnormal,
            -3 => ExitStatus::TimedOut,
            -4 => ExitStatus::Killed,
            -5 => ExitStatus::Duplicate,
            other => ExitStatus::Exited(other),
        }
    }

    /// Human status label, as written to the durable record.
    pub fn label(self) -> String {
        match self {
            ExitStatus::Exited(0) => "Success".to_string(),
            ExitStatus::Exited(code) => format!("Failed (exit code: {code})"),
            ExitStatus::Abnormal => "Terminated abnormally".to_string(),
            ExitStatus::TimedOut => "Timeout terminated".to_string(),
            ExitStatus::Killed => "Manually stopped".to_string(),
            ExitStatus::Duplicate => "Duplicate execution prevented".to_string(),
        }
    }
}

/// One record per execution attempt.
///
/// Created at invocation, mutated in place (looked up by `run_id`) as
/// output arrives and on termination. At most one result per `id` is
/// running at any time; that is the duplicate-prevention invariant.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Stable identity derived from the command text; the duplicate key.
    pub id: String,
    /// Unique per attempt: `id` + start timestamp + random disambiguator.
    pub run_id: String,
    /// The literal command text invoked.
    pub command: String,
    /// Accumulated stdout + stderr, append-only while running.
    pub output: String,
    /// Start time, ms since epoch.
    pub timestamp: i64,
    /// True while the process is alive.
    pub is_running: bool,
    /// `None` while running, terminal status otherwise.
    pub exit: Option<ExitStatus>,
    /// Originating schedule, if this run was triggered by one.
    pub schedule_id: Option<String>,
    /// Wall-clock duration in ms, set once terminal.
    pub execution_time_ms: Option<u64>,
}

impl CommandResult {
    /// Fresh record for a run that is about to spawn.
    pub(crate) fn started(
        id: String,
        run_id: String,
        command: String,
        timestamp: i64,
        schedule_id: Option<String>,
    ) -> Self {
        Self {
            id,
            run_id,
            command,
            output: String::new(),
            timestamp,
            is_running: true,
            exit: None,
            schedule_id,
            execution_time_ms: None,
        }
    }

    /// Numeric exit code, `None` while running.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit.map(ExitStatus::code)
    }
}

/// Options accepted by [`CommandManager::execute`](crate::exec::CommandManager::execute).
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Kill the process if it has not finished after this duration.
    pub timeout: Option<Duration>,
    /// Id of the schedule this execution was triggered from.
    pub schedule_id: Option<String>,
}

/// Stable identity for a command text: `cmd-` + first 8 hex chars of the
/// content hash. Two invocations of the same text share an id.
pub fn command_id(command: &str) -> String {
    let hex = blake3::hash(command.as_bytes()).to_hex();
    format!("cmd-{}", &hex[..8])
}

/// Unique per-attempt id. The random suffix protects against two runs of
/// the same command starting in the same millisecond.
pub fn run_id_for(id: &str, timestamp: i64) -> String {
    let disambiguator = uuid::Uuid::new_v4().simple().to_string();
    format!("{id}_{timestamp}_{}", &disambiguator[..8])
}

/// Current time in ms since epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
