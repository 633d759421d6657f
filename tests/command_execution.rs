use std::error::Error;
use std::time::Duration;

use cronrun::exec::CommandManager;
use cronrun::store::ResultStore;
use cronrun::types::{command_id, ExecutionOptions, ExitStatus};
use cronrun_test_utils::builders::temp_config;
use cronrun_test_utils::{init_tracing, wait_until};

type TestResult = Result<(), Box<dyn Error>>;

fn manager_for(config: &cronrun::config::Config) -> CommandManager {
    CommandManager::new(ResultStore::new(config.log_dir()), config.max_results)
}

#[tokio::test]
async fn echo_succeeds_streams_output_and_persists() -> TestResult {
    init_tracing();
    let (_dir, config) = temp_config();
    let manager = manager_for(&config);

    let initial = manager.execute("echo hello", ExecutionOptions::default());
    assert!(initial.is_running);
    assert_eq!(initial.exit, None);

    let run_id = initial.run_id.clone();
    let probe = manager.clone();
    wait_until("echo to finish", Duration::from_secs(5), || {
        probe
            .results()
            .iter()
            .any(|r| r.run_id == run_id && !r.is_running)
    })
    .await;

    let results = manager.results();
    let done = results.iter().find(|r| r.run_id == run_id).unwrap();
    assert_eq!(done.exit, Some(ExitStatus::Exited(0)));
    assert_eq!(done.exit_code(), Some(0));
    assert!(done.output.contains("hello"));
    assert!(done.execution_time_ms.is_some());

    // A fresh manager over the same data dir sees the persisted run.
    let reloaded = manager_for(&config);
    let history = reloaded.results();
    let record = history.iter().find(|r| r.run_id == run_id).unwrap();
    assert_eq!(record.exit, Some(ExitStatus::Exited(0)));
    assert!(record.output.contains("hello"));
    Ok(())
}

#[tokio::test]
async fn native_exit_code_is_preserved() -> TestResult {
    init_tracing();
    let (_dir, config) = temp_config();
    let manager = manager_for(&config);

    let initial = manager.execute("exit 7", ExecutionOptions::default());
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
    assert_eq!(done.exit, Some(ExitStatus::Exited(7)));
    Ok(())
}

#[tokio::test]
async fn stderr_is_captured_alongside_stdout() -> TestResult {
    init_tracing();
    let (_dir, config) = temp_config();
    let manager = manager_for(&config);

    let initial = manager.execute("echo out; echo err 1>&2", ExecutionOptions::default());
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
    assert!(done.output.contains("out"));
    assert!(done.output.contains("err"));
    Ok(())
}

#[tokio::test]
async fn manual_kill_marks_run_as_stopped() -> TestResult {
    init_tracing();
    let (_dir, config) = temp_config();
    let manager = manager_for(&config);

    let initial = manager.execute("sleep 30", ExecutionOptions::default());
    let id = command_id("sleep 30");
    assert_eq!(manager.active_run_id(&id).as_deref(), Some(initial.run_id.as_str()));

    manager.kill(&id);

    let run_id = initial.run_id.clone();
    let probe = manager.clone();
    wait_until("kill to take effect", Duration::from_secs(5), || {
        probe
            .results()
            .iter()
            .any(|r| r.run_id == run_id && !r.is_running)
    })
    .await;

    let results = manager.results();
    let done = results.iter().find(|r| r.run_id == run_id).unwrap();
    assert_eq!(done.exit, Some(ExitStatus::Killed));
    assert_eq!(done.exit_code(), Some(-4));
    assert!(done.output.contains("manually stopped"));
    assert!(manager.active_run_id(&id).is_none());
    Ok(())
}

#[tokio::test]
async fn kill_of_unknown_id_is_a_noop() {
    init_tracing();
    let (_dir, config) = temp_config();
    let manager = manager_for(&config);
    manager.kill("cmd-deadbeef");
    assert!(manager.results().is_empty());
}
