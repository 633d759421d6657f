// src/schedule/mod.rs

//! Cron scheduling layer.
//!
//! - [`cron`] computes recurrence from five-field cron expressions.
//! - [`store`] persists the schedule list as one JSON document.
//! - [`scheduler`] owns the schedules and their timers, triggers the
//!   command manager on fire, and stamps `last_run` from the manager's
//!   notification stream.

pub mod cron;
pub mod scheduler;
pub mod store;

pub use scheduler::CronScheduler;

use serde::{Deserialize, Serialize};

/// Per-schedule execution options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleOptions {
    /// Timeout budget in ms applied to each triggered execution.
    #[serde(
        default,
        rename = "timeout",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout_ms: Option<u64>,
}

/// One user-defined recurring job.
///
/// `last_run` and `next_run` are derived, not authoritative: `next_run` is
/// recomputed from the cron expression whenever the schedule is re-armed.
/// An enabled, armed schedule always has a `next_run` strictly in the
/// future; a schedule whose expression fails to parse is forced disabled
/// and never armed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    pub id: String,
    pub name: String,
    pub command: String,
    pub cron_expression: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<i64>,
    #[serde(default)]
    pub options: ScheduleOptions,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for [`CronScheduler::add`](scheduler::CronScheduler::add).
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub name: String,
    pub command: String,
    pub cron_expression: String,
    pub enabled: bool,
    pub options: ScheduleOptions,
}

/// Partial update for [`CronScheduler::update`](scheduler::CronScheduler::update).
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub name: Option<String>,
    pub command: Option<String>,
    pub cron_expression: Option<String>,
    pub enabled: Option<bool>,
    pub options: Option<ScheduleOptions>,
}

/// Events emitted by the scheduler for subscribers (UI, tests).
#[derive(Debug, Clone)]
pub enum ScheduleEvent {
    Added(ScheduleConfig),
    Updated(ScheduleConfig),
    Removed(ScheduleConfig),
}
