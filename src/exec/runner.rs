// src/exec/runner.rs

//! Individual command process supervision.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::types::ExitStatus;

use super::encoding::decode_chunk;
use super::manager::ManagerInner;

const MANUAL_STOP_NOTICE: &str = "\n\nCommand was manually stopped by user.";

/// Everything the runner needs to supervise one process.
pub(crate) struct RunSpec {
    pub id: String,
    pub run_id: String,
    pub command: String,
    pub timeout: Option<Duration>,
}

/// Run one command process to completion.
///
/// The process exit races against the timeout (when configured) and the
/// manual kill signal. Whichever fires first decides the terminal status;
/// the losing branches are dropped, so a timeout can never double-fire
/// after a natural exit. Output readers are drained before the record is
/// finalized.
pub(crate) async fn run_command(
    inner: Arc<ManagerInner>,
    spec: RunSpec,
    kill_rx: oneshot::Receiver<()>,
) {
    let started = Instant::now();

    let mut cmd = shell_command(&spec.command);
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(id = %spec.id, run_id = %spec.run_id, error = %err, "failed to spawn command");
            inner.finalize(
                &spec.id,
                &spec.run_id,
                ExitStatus::Exited(1),
                elapsed_ms(started),
                Some(&format!("\n\nError executing command: {err}")),
            );
            return;
        }
    };

    let stdout_reader = child
        .stdout
        .take()
        .map(|stream| spawn_stream_reader(Arc::clone(&inner), spec.run_id.clone(), stream));
    let stderr_reader = child
        .stderr
        .take()
        .map(|stream| spawn_stream_reader(Arc::clone(&inner), spec.run_id.clone(), stream));

    let timeout_fired = async {
        match spec.timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(timeout_fired);
    let mut kill_rx = kill_rx;

    let (exit, notice) = tokio::select! {
        outcome = wait_outcome(&mut child) => outcome,

        () = &mut timeout_fired => {
            let timeout = spec.timeout.unwrap_or_default();
            warn!(id = %spec.id, run_id = %spec.run_id, ?timeout, "command timed out; killing process");
            if let Err(err) = child.kill().await {
                warn!(id = %spec.id, error = %err, "failed to kill timed-out process");
            }
            let seconds = timeout.as_millis() as f64 / 1000.0;
            (
                ExitStatus::TimedOut,
                Some(format!(
                    "\nCommand timed out after {seconds} seconds and was terminated.\n"
                )),
            )
        }

        requested = &mut kill_rx => {
            match requested {
                Ok(()) => {
                    if let Err(err) = child.kill().await {
                        warn!(id = %spec.id, error = %err, "failed to kill process on manual stop");
                    }
                    (ExitStatus::Killed, Some(MANUAL_STOP_NOTICE.to_string()))
                }
                Err(_) => {
                    // Kill sender vanished without an explicit request;
                    // fall back to waiting for the process itself.
                    debug!(id = %spec.id, "kill channel closed without request");
                    wait_outcome(&mut child).await
                }
            }
        }
    };

    // Let both readers hit EOF so the final record carries all output.
    if let Some(handle) = stdout_reader {
        let _ = handle.await;
    }
    if let Some(handle) = stderr_reader {
        let _ = handle.await;
    }

    inner.finalize(
        &spec.id,
        &spec.run_id,
        exit,
        elapsed_ms(started),
        notice.as_deref(),
    );
}

/// Wait for the child and map its status into the exit taxonomy.
async fn wait_outcome(child: &mut Child) -> (ExitStatus, Option<String>) {
    match child.wait().await {
        Ok(status) => match status.code() {
            Some(code) => (ExitStatus::Exited(code), None),
            // Killed by an external signal: the manager never observed a
            // proper completion.
            None => (ExitStatus::Abnormal, None),
        },
        Err(err) => (
            ExitStatus::Exited(1),
            Some(format!("\n\nError executing command: {err}")),
        ),
    }
}

/// Read raw byte chunks off one output pipe, decode each to UTF-8 and
/// append it to the run's record. Chunks, not lines: the bytes may be in
/// a non-UTF-8 encoding where line splitting would be wrong.
fn spawn_stream_reader(
    inner: Arc<ManagerInner>,
    run_id: String,
    mut stream: impl AsyncRead + Unpin + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let text = decode_chunk(&buf[..n]);
                    inner.append_output(&run_id, &text);
                }
                Err(err) => {
                    debug!(%run_id, error = %err, "output stream read error");
                    break;
                }
            }
        }
    })
}

/// Build a shell command appropriate for the platform.
///
/// Commands go through the shell so pipes and redirection keep working.
/// On Windows the child environment additionally pins Python output to
/// UTF-8, which sidesteps the most common mojibake source there.
fn shell_command(command: &str) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };
    if cfg!(windows) {
        cmd.env("PYTHONIOENCODING", "utf-8");
    }
    cmd
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
