#![allow(dead_code)]

use cronrun::config::Config;
use cronrun::schedule::{NewSchedule, ScheduleOptions};
use tempfile::TempDir;

/// A config rooted in a fresh temp directory. Keep the `TempDir` alive for
/// the duration of the test; dropping it deletes all persisted state.
pub fn temp_config() -> (TempDir, Config) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        max_results: 50,
    };
    (dir, config)
}

/// Builder for `NewSchedule` to simplify test setup.
pub struct NewScheduleBuilder {
    schedule: NewSchedule,
}

impl NewScheduleBuilder {
    pub fn new(name: &str, command: &str) -> Self {
        Self {
            schedule: NewSchedule {
                name: name.to_string(),
                command: command.to_string(),
                cron_expression: "* * * * *".to_string(),
                enabled: true,
                options: ScheduleOptions::default(),
            },
        }
    }

    pub fn cron(mut self, expression: &str) -> Self {
        self.schedule.cron_expression = expression.to_string();
        self
    }

    pub fn enabled(mut self, val: bool) -> Self {
        self.schedule.enabled = val;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.schedule.options.timeout_ms = Some(ms);
        self
    }

    pub fn build(self) -> NewSchedule {
        self.schedule
    }
}
