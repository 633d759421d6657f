// src/store/cache.rs

//! Bounded in-memory cache of recent command results.
//!
//! Results are kept newest-first and capped; anything evicted here stays on
//! durable storage. All mutation goes through `run_id` lookup, never a
//! positional index.

use crate::types::{CommandResult, ExitStatus};

#[derive(Debug)]
pub struct ResultCache {
    results: Vec<CommandResult>,
    cap: usize,
}

impl ResultCache {
    pub fn new(cap: usize) -> Self {
        Self {
            results: Vec::new(),
            cap,
        }
    }

    /// Seed the cache from durable storage. Input is expected newest-first;
    /// anything beyond the cap is dropped.
    pub fn populate(&mut self, mut results: Vec<CommandResult>) {
        results.truncate(self.cap);
        self.results = results;
    }

    /// Insert a new result at the front, or replace an existing one with
    /// the same `run_id` in place.
    pub fn upsert(&mut self, result: CommandResult) {
        match self.position(&result.run_id) {
            Some(index) => self.results[index] = result,
            None => {
                self.results.insert(0, result);
                self.results.truncate(self.cap);
            }
        }
    }

    /// Append an output chunk to the result with the given `run_id`,
    /// returning the updated record for persistence/notification.
    pub fn append_output(&mut self, run_id: &str, chunk: &str) -> Option<CommandResult> {
        let index = self.position(run_id)?;
        self.results[index].output.push_str(chunk);
        Some(self.results[index].clone())
    }

    /// Mark the result with the given `run_id` terminal, optionally
    /// appending a final notice (timeout / manual-stop messages).
    pub fn finalize(
        &mut self,
        run_id: &str,
        exit: ExitStatus,
        execution_time_ms: u64,
        notice: Option<&str>,
    ) -> Option<CommandResult> {
        let index = self.position(run_id)?;
        let result = &mut self.results[index];
        if let Some(notice) = notice {
            result.output.push_str(notice);
        }
        result.is_running = false;
        result.exit = Some(exit);
        result.execution_time_ms = Some(execution_time_ms);
        Some(result.clone())
    }

    /// All cached results, newest first.
    pub fn snapshot(&self) -> Vec<CommandResult> {
        self.results.clone()
    }

    pub fn get(&self, run_id: &str) -> Option<&CommandResult> {
        self.position(run_id).map(|i| &self.results[i])
    }

    fn position(&self, run_id: &str) -> Option<usize> {
        self.results.iter().position(|r| r.run_id == run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{command_id, run_id_for, CommandResult};

    fn result(command: &str, timestamp: i64) -> CommandResult {
        let id = command_id(command);
        let run_id = run_id_for(&id, timestamp);
        CommandResult::started(id, run_id, command.to_string(), timestamp, None)
    }

    #[test]
    fn upsert_inserts_newest_first_and_caps() {
        let mut cache = ResultCache::new(3);
        for i in 0..5 {
            cache.upsert(result(&format!("echo {i}"), i));
        }
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].command, "echo 4");
        assert_eq!(snapshot[2].command, "echo 2");
    }

    #[test]
    fn upsert_replaces_by_run_id() {
        let mut cache = ResultCache::new(3);
        let mut r = result("echo hi", 1);
        cache.upsert(r.clone());

        r.output.push_str("hi\n");
        cache.upsert(r.clone());

        assert_eq!(cache.snapshot().len(), 1);
        assert_eq!(cache.get(&r.run_id).unwrap().output, "hi\n");
    }

    #[test]
    fn append_and_finalize_by_run_id() {
        let mut cache = ResultCache::new(3);
        let r = result("echo hi", 1);
        let run_id = r.run_id.clone();
        cache.upsert(r);

        let updated = cache.append_output(&run_id, "hi\n").unwrap();
        assert_eq!(updated.output, "hi\n");
        assert!(updated.is_running);

        let done = cache
            .finalize(&run_id, ExitStatus::Exited(0), 25, None)
            .unwrap();
        assert!(!done.is_running);
        assert_eq!(done.exit, Some(ExitStatus::Exited(0)));
        assert_eq!(done.execution_time_ms, Some(25));
    }

    #[test]
    fn finalize_appends_notice() {
        let mut cache = ResultCache::new(3);
        let r = result("sleep 10", 1);
        let run_id = r.run_id.clone();
        cache.upsert(r);

        let done = cache
            .finalize(&run_id, ExitStatus::Killed, 100, Some("\n\nstopped"))
            .unwrap();
        assert!(done.output.ends_with("stopped"));
    }

    #[test]
    fn missing_run_id_is_a_noop() {
        let mut cache = ResultCache::new(3);
        assert!(cache.append_output("nope", "x").is_none());
        assert!(cache.finalize("nope", ExitStatus::Abnormal, 0, None).is_none());
    }
}
