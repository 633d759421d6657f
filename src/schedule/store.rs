// src/schedule/store.rs

//! Durable schedule storage: the whole list as one JSON document, written
//! in full on every mutation.

use std::fs;
use std::path::PathBuf;

use tracing::warn;

use crate::errors::Result;

use super::ScheduleConfig;

pub const SCHEDULES_FILE_NAME: &str = "schedules.json";

#[derive(Debug, Clone)]
pub struct ScheduleStore {
    path: PathBuf,
}

impl ScheduleStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join(SCHEDULES_FILE_NAME),
        }
    }

    /// Load the persisted list. A missing file is an empty list; a corrupt
    /// file is logged and also yields an empty list rather than failing
    /// startup.
    pub fn load(&self) -> Vec<ScheduleConfig> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return Vec::new(),
        };

        match serde_json::from_str(&contents) {
            Ok(schedules) => schedules,
            Err(err) => {
                warn!(path = ?self.path, error = %err, "failed to parse schedule list; starting empty");
                Vec::new()
            }
        }
    }

    /// Write the full list.
    pub fn save(&self, schedules: &[ScheduleConfig]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(schedules)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ScheduleOptions;

    fn sample(id: &str) -> ScheduleConfig {
        ScheduleConfig {
            id: id.to_string(),
            name: "ping".to_string(),
            command: "echo hi".to_string(),
            cron_expression: "* * * * *".to_string(),
            enabled: true,
            last_run: None,
            next_run: None,
            options: ScheduleOptions::default(),
            created_at: 1,
            updated_at: 1,
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(dir.path().to_path_buf());
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(dir.path().to_path_buf());

        store.save(&[sample("a"), sample("b")]).unwrap();
        let loaded = store.load();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "a");
        assert_eq!(loaded[1].id, "b");
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(dir.path().to_path_buf());
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join(SCHEDULES_FILE_NAME), "[ nope").unwrap();
        assert!(store.load().is_empty());
    }
}
