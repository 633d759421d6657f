use std::error::Error;
use std::time::Duration;

use cronrun::exec::CommandManager;
use cronrun::store::ResultStore;
use cronrun::types::{command_id, ExecutionOptions, ExitStatus};
use cronrun_test_utils::builders::temp_config;
use cronrun_test_utils::{init_tracing, wait_until};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn second_concurrent_execution_is_rejected() -> TestResult {
    init_tracing();
    let (_dir, config) = temp_config();
    let manager = CommandManager::new(ResultStore::new(config.log_dir()), config.max_results);

    let first = manager.execute("sleep 30", ExecutionOptions::default());
    assert!(first.is_running);

    // Same command text while the first is in flight: rejected before any
    // process is spawned, with its own terminal result.
    let second = manager.execute("sleep 30", ExecutionOptions::default());
    assert!(!second.is_running);
    assert_eq!(second.exit, Some(ExitStatus::Duplicate));
    assert_eq!(second.exit_code(), Some(-5));
    assert!(second.output.contains("already running"));
    assert_ne!(second.run_id, first.run_id);
    assert_eq!(second.id, first.id);

    // The rejection is part of the history too.
    assert!(manager
        .results()
        .iter()
        .any(|r| r.run_id == second.run_id && r.exit == Some(ExitStatus::Duplicate)));

    // The first run is untouched by the rejection.
    let id = command_id("sleep 30");
    assert_eq!(
        manager.active_run_id(&id).as_deref(),
        Some(first.run_id.as_str())
    );

    manager.kill(&id);
    Ok(())
}

#[tokio::test]
async fn same_command_can_run_again_after_completion() -> TestResult {
    init_tracing();
    let (_dir, config) = temp_config();
    let manager = CommandManager::new(ResultStore::new(config.log_dir()), config.max_results);

    let first = manager.execute("echo again", ExecutionOptions::default());
    let first_run = first.run_id.clone();

    let probe = manager.clone();
    wait_until("first run to finish", Duration::from_secs(5), || {
        probe
            .results()
            .iter()
            .any(|r| r.run_id == first_run && !r.is_running)
    })
    .await;

    let second = manager.execute("echo again", ExecutionOptions::default());
    assert!(second.is_running);
    assert_ne!(second.run_id, first.run_id);

    let second_run = second.run_id.clone();
    let probe = manager.clone();
    wait_until("second run to finish", Duration::from_secs(5), || {
        probe
            .results()
            .iter()
            .any(|r| r.run_id == second_run && !r.is_running)
    })
    .await;

    let results = manager.results();
    let done = results.iter().find(|r| r.run_id == second_run).unwrap();
    assert_eq!(done.exit, Some(ExitStatus::Exited(0)));
    Ok(())
}

#[tokio::test]
async fn different_commands_run_concurrently() -> TestResult {
    init_tracing();
    let (_dir, config) = temp_config();
    let manager = CommandManager::new(ResultStore::new(config.log_dir()), config.max_results);

    let a = manager.execute("sleep 30", ExecutionOptions::default());
    let b = manager.execute("sleep 31", ExecutionOptions::default());
    assert!(a.is_running);
    assert!(b.is_running);
    assert_ne!(a.id, b.id);

    manager.kill(&a.id);
    manager.kill(&b.id);
    Ok(())
}
