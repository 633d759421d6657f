// src/exec/manager.rs

//! Public command-execution API.
//!
//! The manager owns three pieces of state, each behind its own mutex
//! because completion, timeout firing and manual kills can race for the
//! same command id:
//!
//! - the active-command map (command id → kill handle), which doubles as
//!   the duplicate-execution gate,
//! - the bounded in-memory result cache,
//! - and (immutably) the durable store underneath it.
//!
//! Every result mutation flows through one commit path: update the cache
//! by `run_id`, persist the full record, then notify subscribers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::store::{ResultCache, ResultStore};
use crate::types::{
    command_id, now_ms, run_id_for, CommandResult, ExecutionOptions, ExitStatus,
};

use super::runner::{run_command, RunSpec};

const NOTIFY_CHANNEL_CAPACITY: usize = 256;

const DUPLICATE_NOTICE: &str =
    "Error: the same command is already running. Execution was cancelled.";

/// Per-command handle kept while its process is alive.
///
/// Presence of an entry in the active map is the duplicate gate; the kill
/// sender is taken (once) on manual termination.
struct ActiveCommand {
    run_id: String,
    kill: Option<oneshot::Sender<()>>,
}

pub(crate) struct ManagerInner {
    store: ResultStore,
    cache: Mutex<ResultCache>,
    active: Mutex<HashMap<String, ActiveCommand>>,
    notify_tx: broadcast::Sender<CommandResult>,
}

/// Supervises external command executions and their history.
///
/// Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct CommandManager {
    inner: Arc<ManagerInner>,
}

impl CommandManager {
    /// Create a manager backed by the given store, seeding the in-memory
    /// cache from durable storage (newest first, capped).
    pub fn new(store: ResultStore, max_results: usize) -> Self {
        let recent = store.load_recent(max_results);
        info!(count = recent.len(), "loaded command history");

        let mut cache = ResultCache::new(max_results);
        cache.populate(recent);

        let (notify_tx, _) = broadcast::channel(NOTIFY_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(ManagerInner {
                store,
                cache: Mutex::new(cache),
                active: Mutex::new(HashMap::new()),
                notify_tx,
            }),
        }
    }

    /// Execute a command, returning its initial result immediately.
    ///
    /// If the same command text is already in flight, no process is
    /// spawned; a terminal result with [`ExitStatus::Duplicate`] is
    /// persisted, notified and returned instead. The check and the
    /// reservation happen under one lock, so two concurrent calls for the
    /// same text can never both pass.
    ///
    /// Must be called from within a Tokio runtime: the process is
    /// supervised on a spawned task and the caller is never blocked.
    pub fn execute(&self, command: &str, options: ExecutionOptions) -> CommandResult {
        let id = command_id(command);
        let timestamp = now_ms();
        let run_id = run_id_for(&id, timestamp);

        let kill_rx = {
            let mut active = self.inner.active.lock().unwrap();
            if active.contains_key(&id) {
                drop(active);
                debug!(%id, command, "duplicate execution prevented");
                let result = CommandResult {
                    id,
                    run_id,
                    command: command.to_string(),
                    output: DUPLICATE_NOTICE.to_string(),
                    timestamp,
                    is_running: false,
                    exit: Some(ExitStatus::Duplicate),
                    schedule_id: options.schedule_id,
                    execution_time_ms: None,
                };
                self.inner.commit(&result);
                return result;
            }

            let (kill_tx, kill_rx) = oneshot::channel();
            active.insert(
                id.clone(),
                ActiveCommand {
                    run_id: run_id.clone(),
                    kill: Some(kill_tx),
                },
            );
            kill_rx
        };

        info!(%id, %run_id, command, "starting command");

        let result = CommandResult::started(
            id.clone(),
            run_id.clone(),
            command.to_string(),
            timestamp,
            options.schedule_id,
        );
        self.inner.commit(&result);

        let spec = RunSpec {
            id,
            run_id,
            command: command.to_string(),
            timeout: options.timeout,
        };
        tokio::spawn(run_command(Arc::clone(&self.inner), spec, kill_rx));

        result
    }

    /// Request manual termination of the running process for a command id.
    ///
    /// A no-op when nothing with that id is in flight (or a kill was
    /// already requested). The runner appends the stop notice, records
    /// [`ExitStatus::Killed`] and clears the active entry.
    pub fn kill(&self, id: &str) {
        let kill = {
            let mut active = self.inner.active.lock().unwrap();
            active.get_mut(id).and_then(|entry| entry.kill.take())
        };

        match kill {
            Some(tx) => {
                info!(%id, "manual kill requested");
                // Err means the runner already finished; nothing to stop.
                let _ = tx.send(());
            }
            None => debug!(%id, "kill requested but command not active"),
        }
    }

    /// The run id currently in flight for a command id, if any.
    pub fn active_run_id(&self, id: &str) -> Option<String> {
        let active = self.inner.active.lock().unwrap();
        active.get(id).map(|entry| entry.run_id.clone())
    }

    /// Recent results, newest first, capped at the configured maximum.
    pub fn results(&self) -> Vec<CommandResult> {
        self.inner.cache.lock().unwrap().snapshot()
    }

    /// Subscribe to every result mutation as it happens: the initial
    /// "running" record, each output chunk, and the terminal transition.
    pub fn subscribe(&self) -> broadcast::Receiver<CommandResult> {
        self.inner.notify_tx.subscribe()
    }
}

impl ManagerInner {
    /// Cache upsert + persist + notify, the path for new records.
    pub(crate) fn commit(&self, result: &CommandResult) {
        self.cache.lock().unwrap().upsert(result.clone());
        self.persist_and_notify(result);
    }

    /// Append decoded output to a running record, then persist and notify.
    pub(crate) fn append_output(&self, run_id: &str, chunk: &str) {
        let updated = self.cache.lock().unwrap().append_output(run_id, chunk);
        if let Some(result) = updated {
            self.persist_and_notify(&result);
        }
    }

    /// Mark a run terminal, clear its active entry, persist and notify.
    pub(crate) fn finalize(
        &self,
        id: &str,
        run_id: &str,
        exit: ExitStatus,
        execution_time_ms: u64,
        notice: Option<&str>,
    ) {
        self.active.lock().unwrap().remove(id);

        let updated =
            self.cache
                .lock()
                .unwrap()
                .finalize(run_id, exit, execution_time_ms, notice);
        if let Some(result) = updated {
            info!(
                %id,
                %run_id,
                exit_code = exit.code(),
                execution_time_ms,
                "command finished"
            );
            self.persist_and_notify(&result);
        }
    }

    fn persist_and_notify(&self, result: &CommandResult) {
        if let Err(err) = self.store.save(result) {
            warn!(run_id = %result.run_id, error = %err, "failed to persist run record");
        }
        // No receivers is fine; subscribers come and go.
        let _ = self.notify_tx.send(result.clone());
    }
}
