use std::error::Error;
use std::time::Duration;

use cronrun::exec::CommandManager;
use cronrun::store::ResultStore;
use cronrun::types::{ExecutionOptions, ExitStatus};
use cronrun_test_utils::builders::temp_config;
use cronrun_test_utils::{init_tracing, wait_until};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn long_command_is_killed_at_the_timeout() -> TestResult {
    init_tracing();
    let (_dir, config) = temp_config();
    let manager = CommandManager::new(ResultStore::new(config.log_dir()), config.max_results);

    let initial = manager.execute(
        "sleep 30",
        ExecutionOptions {
            timeout: Some(Duration::from_millis(300)),
            schedule_id: None,
        },
    );
    let run_id = initial.run_id.clone();

    let probe = manager.clone();
    wait_until("timeout to fire", Duration::from_secs(5), || {
        probe
            .results()
            .iter()
            .any(|r| r.run_id == run_id && !r.is_running)
    })
    .await;

    let results = manager.results();
    let done = results.iter().find(|r| r.run_id == run_id).unwrap();
    assert_eq!(done.exit, Some(ExitStatus::TimedOut));
    assert_eq!(done.exit_code(), Some(-3));
    assert!(done.output.contains("timed out"));

    // Elapsed time reflects the timeout budget, not the command's natural
    // duration.
    let elapsed = done.execution_time_ms.unwrap();
    assert!(elapsed >= 300, "elapsed {elapsed}ms shorter than the timeout");
    assert!(elapsed < 5_000, "elapsed {elapsed}ms; process was not killed");

    // The active slot is free again.
    assert!(manager.active_run_id(&done.id).is_none());
    Ok(())
}

#[tokio::test]
async fn fast_command_beats_its_timeout() -> TestResult {
    init_tracing();
    let (_dir, config) = temp_config();
    let manager = CommandManager::new(ResultStore::new(config.log_dir()), config.max_results);

    let initial = manager.execute(
        "echo quick",
        ExecutionOptions {
            timeout: Some(Duration::from_secs(30)),
            schedule_id: None,
        },
    );
    let run_id = initial.run_id.clone();

    let probe = manager.clone();
    wait_until("command to finish", Duration::from_secs(5), || {
        probe
            .results()
            .iter()
            .any(|r| r.run_id == run_id && !r.is_running)
    })
    .await;

    let results = manager.results();
    let done = results.iter().find(|r| r.run_id == run_id).unwrap();
    assert_eq!(done.exit, Some(ExitStatus::Exited(0)));
    assert!(done.output.contains("quick"));
    assert!(!done.output.contains("timed out"));
    Ok(())
}
