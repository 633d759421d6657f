// src/schedule/scheduler.rs

//! Schedule ownership, timers and CRUD.
//!
//! Each enabled schedule is backed by at most one timer task. The task
//! sleeps until `next_run`, triggers the command manager, recomputes the
//! following fire time from "now" and goes back to sleep — recurrence is
//! self-perpetuating rather than a fixed interval, so drift never
//! accumulates. Every transition (add/update/remove/enable/disable)
//! disarms the previous timer before optionally arming a new one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::exec::CommandManager;
use crate::types::{now_ms, CommandResult, ExecutionOptions};

use super::cron;
use super::store::ScheduleStore;
use super::{NewSchedule, ScheduleConfig, ScheduleEvent, ScheduleUpdate};

const EVENT_CHANNEL_CAPACITY: usize = 64;

struct SchedulerInner {
    store: ScheduleStore,
    schedules: Mutex<Vec<ScheduleConfig>>,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    manager: CommandManager,
    events_tx: broadcast::Sender<ScheduleEvent>,
}

/// Owns all [`ScheduleConfig`]s and their timers.
///
/// Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct CronScheduler {
    inner: Arc<SchedulerInner>,
}

impl CronScheduler {
    /// Load persisted schedules, reconcile their `next_run`s, subscribe to
    /// the manager's result stream for `last_run` stamping, and arm every
    /// enabled schedule.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(manager: CommandManager, store: ScheduleStore) -> Self {
        let mut schedules = store.load();
        reconcile_loaded(&mut schedules);
        info!(count = schedules.len(), "loaded schedules");

        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(SchedulerInner {
            store,
            schedules: Mutex::new(schedules),
            timers: Mutex::new(HashMap::new()),
            manager,
            events_tx,
        });

        spawn_result_linkage(Arc::clone(&inner));

        let scheduler = Self { inner };
        scheduler.start_all();
        scheduler
    }

    /// Disarm everything, then arm every enabled schedule.
    pub fn start_all(&self) {
        {
            let mut timers = self.inner.timers.lock().unwrap();
            for (_, handle) in timers.drain() {
                handle.abort();
            }
        }

        let snapshot = self.schedules();
        for schedule in snapshot {
            if schedule.enabled {
                self.arm(&schedule);
            }
        }
    }

    /// Add a new schedule. An unparsable cron expression is not an error:
    /// the schedule is stored disabled, with no `next_run` and no timer.
    pub fn add(&self, new: NewSchedule) -> ScheduleConfig {
        let now = now_ms();
        let mut schedule = ScheduleConfig {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name,
            command: new.command,
            cron_expression: new.cron_expression,
            enabled: new.enabled,
            last_run: None,
            next_run: None,
            options: new.options,
            created_at: now,
            updated_at: now,
        };

        if schedule.enabled {
            match cron::next_fire_ms(&schedule.cron_expression, now) {
                Ok(next) => schedule.next_run = Some(next),
                Err(err) => {
                    warn!(
                        schedule = %schedule.name,
                        error = %err,
                        "invalid cron expression; schedule disabled"
                    );
                    schedule.enabled = false;
                }
            }
        }

        {
            let mut schedules = self.inner.schedules.lock().unwrap();
            schedules.push(schedule.clone());
            self.inner.save_locked(&schedules);
        }

        if schedule.enabled {
            self.arm(&schedule);
        }

        self.inner.emit(ScheduleEvent::Added(schedule.clone()));
        schedule
    }

    /// Merge a partial update into an existing schedule.
    ///
    /// The previous timer is always disarmed first. `next_run` is
    /// recomputed when the cron expression changed or the schedule
    /// transitioned from disabled to enabled; an expression that fails to
    /// parse forces `enabled = false` without surfacing an error.
    pub fn update(&self, id: &str, update: ScheduleUpdate) -> Option<ScheduleConfig> {
        self.inner.disarm(id);

        let updated = {
            let mut schedules = self.inner.schedules.lock().unwrap();
            let entry = schedules.iter_mut().find(|s| s.id == id)?;

            let was_enabled = entry.enabled;
            let old_expression = entry.cron_expression.clone();

            if let Some(name) = update.name {
                entry.name = name;
            }
            if let Some(command) = update.command {
                entry.command = command;
            }
            if let Some(expression) = update.cron_expression {
                entry.cron_expression = expression;
            }
            if let Some(enabled) = update.enabled {
                entry.enabled = enabled;
            }
            if let Some(options) = update.options {
                entry.options = options;
            }
            entry.updated_at = now_ms();

            let expression_changed = entry.cron_expression != old_expression;
            let newly_enabled = entry.enabled && !was_enabled;
            if entry.enabled && (expression_changed || newly_enabled) {
                match cron::next_fire_ms(&entry.cron_expression, now_ms()) {
                    Ok(next) => entry.next_run = Some(next),
                    Err(err) => {
                        warn!(
                            schedule = %entry.name,
                            error = %err,
                            "invalid cron expression on update; schedule disabled"
                        );
                        entry.enabled = false;
                        entry.next_run = None;
                    }
                }
            }

            let snapshot = entry.clone();
            self.inner.save_locked(&schedules);
            snapshot
        };

        if updated.enabled {
            self.arm(&updated);
        }

        self.inner.emit(ScheduleEvent::Updated(updated.clone()));
        Some(updated)
    }

    /// Remove a schedule: disarm its timer, drop it from the persisted
    /// list, emit a removed event. Returns false for an unknown id.
    pub fn remove(&self, id: &str) -> bool {
        self.inner.disarm(id);

        let removed = {
            let mut schedules = self.inner.schedules.lock().unwrap();
            let Some(index) = schedules.iter().position(|s| s.id == id) else {
                return false;
            };
            let removed = schedules.remove(index);
            self.inner.save_locked(&schedules);
            removed
        };

        self.inner.emit(ScheduleEvent::Removed(removed));
        true
    }

    /// Thin wrapper over [`update`](Self::update).
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Option<ScheduleConfig> {
        self.update(
            id,
            ScheduleUpdate {
                enabled: Some(enabled),
                ..ScheduleUpdate::default()
            },
        )
    }

    /// Trigger a schedule's command immediately, without touching its
    /// timer or `next_run`.
    pub fn execute_now(&self, id: &str) -> Option<CommandResult> {
        let schedule = self.schedule_by_id(id)?;
        Some(self.inner.execute_schedule(&schedule))
    }

    pub fn schedules(&self) -> Vec<ScheduleConfig> {
        self.inner.schedules.lock().unwrap().clone()
    }

    pub fn schedule_by_id(&self, id: &str) -> Option<ScheduleConfig> {
        self.inner
            .schedules
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    /// Recent schedule-triggered executions, newest first.
    pub fn recent_executions(&self, limit: usize) -> Vec<CommandResult> {
        self.inner
            .manager
            .results()
            .into_iter()
            .filter(|r| r.schedule_id.is_some())
            .take(limit)
            .collect()
    }

    /// Recent executions for one schedule, newest first.
    pub fn executions_for(&self, schedule_id: &str, limit: usize) -> Vec<CommandResult> {
        self.inner
            .manager
            .results()
            .into_iter()
            .filter(|r| r.schedule_id.as_deref() == Some(schedule_id))
            .take(limit)
            .collect()
    }

    /// Subscribe to added/updated/removed schedule events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScheduleEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Arm the timer for one enabled schedule, replacing any previous one.
    ///
    /// A `next_run` that is already in the past (clock drift, long sleep)
    /// is recomputed from the current time and persisted before the timer
    /// is started.
    fn arm(&self, schedule: &ScheduleConfig) {
        if !schedule.enabled {
            return;
        }

        let now = now_ms();
        let next_run = match schedule.next_run {
            Some(next) if next > now => next,
            _ => match cron::next_fire_ms(&schedule.cron_expression, now) {
                Ok(next) => {
                    self.inner.set_next_run(&schedule.id, next);
                    next
                }
                Err(err) => {
                    warn!(schedule = %schedule.name, error = %err, "cannot arm schedule");
                    return;
                }
            },
        };

        debug!(schedule = %schedule.name, next_run, "arming schedule");

        let inner = Arc::clone(&self.inner);
        let id = schedule.id.clone();
        let expression = schedule.cron_expression.clone();
        let handle = tokio::spawn(async move {
            let mut next = next_run;
            loop {
                let delay = (next - now_ms()).max(0) as u64;
                tokio::time::sleep(Duration::from_millis(delay)).await;

                inner.fire(&id);

                match cron::next_fire_ms(&expression, now_ms()) {
                    Ok(recomputed) => {
                        inner.set_next_run(&id, recomputed);
                        next = recomputed;
                    }
                    Err(err) => {
                        warn!(schedule_id = %id, error = %err, "failed to recompute next run; timer stopped");
                        break;
                    }
                }
            }
        });

        let mut timers = self.inner.timers.lock().unwrap();
        if let Some(previous) = timers.insert(schedule.id.clone(), handle) {
            previous.abort();
        }
    }
}

impl SchedulerInner {
    fn disarm(&self, id: &str) {
        if let Some(handle) = self.timers.lock().unwrap().remove(id) {
            handle.abort();
            debug!(schedule_id = %id, "timer disarmed");
        }
    }

    /// Timer fire path: look the schedule up fresh (it may have changed or
    /// been disabled since arming) and trigger its command.
    fn fire(&self, id: &str) {
        let schedule = {
            let schedules = self.schedules.lock().unwrap();
            schedules.iter().find(|s| s.id == id).cloned()
        };
        let Some(schedule) = schedule else {
            return;
        };
        if !schedule.enabled {
            return;
        }

        info!(schedule = %schedule.name, command = %schedule.command, "schedule fired");
        self.execute_schedule(&schedule);
    }

    fn execute_schedule(&self, schedule: &ScheduleConfig) -> CommandResult {
        let options = ExecutionOptions {
            timeout: schedule.options.timeout_ms.map(Duration::from_millis),
            schedule_id: Some(schedule.id.clone()),
        };
        let result = self.manager.execute(&schedule.command, options);
        self.stamp_last_run(&schedule.id);
        result
    }

    /// Stamp `last_run` and persist, without touching the timer or
    /// `next_run`. Called at trigger time and for every notified result
    /// carrying this schedule's id.
    fn stamp_last_run(&self, id: &str) {
        let updated = {
            let mut schedules = self.schedules.lock().unwrap();
            let Some(entry) = schedules.iter_mut().find(|s| s.id == id) else {
                return;
            };
            entry.last_run = Some(now_ms());
            let snapshot = entry.clone();
            self.save_locked(&schedules);
            snapshot
        };
        self.emit(ScheduleEvent::Updated(updated));
    }

    fn set_next_run(&self, id: &str, next_run: i64) {
        let mut schedules = self.schedules.lock().unwrap();
        if let Some(entry) = schedules.iter_mut().find(|s| s.id == id) {
            entry.next_run = Some(next_run);
            self.save_locked(&schedules);
        }
    }

    fn save_locked(&self, schedules: &[ScheduleConfig]) {
        if let Err(err) = self.store.save(schedules) {
            warn!(error = %err, "failed to persist schedule list");
        }
    }

    fn emit(&self, event: ScheduleEvent) {
        // No receivers is fine; subscribers come and go.
        let _ = self.events_tx.send(event);
    }
}

/// Recompute `next_run` for every enabled schedule loaded from disk; an
/// expression that no longer parses disables its schedule without failing
/// the load.
fn reconcile_loaded(schedules: &mut [ScheduleConfig]) {
    let now = now_ms();
    for schedule in schedules.iter_mut() {
        if !schedule.enabled {
            continue;
        }
        match cron::next_fire_ms(&schedule.cron_expression, now) {
            Ok(next) => schedule.next_run = Some(next),
            Err(err) => {
                warn!(
                    schedule = %schedule.name,
                    error = %err,
                    "invalid cron expression on load; schedule disabled"
                );
                schedule.enabled = false;
                schedule.next_run = None;
            }
        }
    }
}

/// Watch the manager's notification stream and stamp `last_run` on the
/// owning schedule of every result that carries a schedule id. This must
/// never touch the schedule's timer.
fn spawn_result_linkage(inner: Arc<SchedulerInner>) {
    let mut rx = inner.manager.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(result) => {
                    if let Some(schedule_id) = result.schedule_id.as_deref() {
                        inner.stamp_last_run(schedule_id);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "result linkage lagged behind notifications");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
