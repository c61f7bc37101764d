// src/exec/process.rs

//! Spawning, monitoring and terminating the backend child process.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::model::BackendConfig;
use crate::engine::RuntimeEvent;

/// Build the backend command: argv as configured, standard IO inherited from
/// the terminal, killed if its handle is ever dropped.
///
/// On unix the child leads a new process group, so the server behind a
/// wrapper (`sh -c`, `npm start`) is signalled together with the wrapper.
/// Terminal Ctrl-C no longer reaches it directly; the runtime stops it.
pub fn backend_command(spec: &BackendConfig, root: &Path) -> Command {
    let mut cmd = Command::new(&spec.command[0]);
    cmd.args(&spec.command[1..])
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let cwd = match &spec.cwd {
        Some(dir) => root.join(dir),
        None => root.to_path_buf(),
    };
    cmd.current_dir(cwd);
    cmd
}

/// `docker-compose up` style rendering of an argv, for logs and errors.
pub fn describe(argv: &[String]) -> String {
    argv.join(" ")
}

/// Watch one child until it exits or a stop is requested.
///
/// - Natural exit: a `ProcessExited` event tagged with `generation` is
///   delivered to the runtime.
/// - Stop request (or the supervisor dropping the sender): the child is
///   terminated and no exit event is sent.
pub async fn monitor(
    mut child: Child,
    generation: u64,
    mut stop_rx: oneshot::Receiver<()>,
    kill_timeout: Duration,
    events: mpsc::Sender<RuntimeEvent>,
) {
    let pid = child.id();

    tokio::select! {
        status = child.wait() => {
            let code = match status {
                Ok(status) => status.code(),
                Err(err) => {
                    warn!(generation, error = %err, "waiting for backend process failed");
                    None
                }
            };
            debug!(generation, exit_code = ?code, "backend process exited");
            if let Some(pid) = pid {
                sweep_group(pid).await;
            }

            // Deliver from a detached task: the runtime may be awaiting this
            // monitor (during a stop) and must not be needed to drain it.
            tokio::spawn(async move {
                let _ = events
                    .send(RuntimeEvent::ProcessExited { generation, code })
                    .await;
            });
        }
        _ = &mut stop_rx => {
            terminate(&mut child, kill_timeout).await;
        }
    }
}

/// Ask the child's process group to stop, then force-kill the group if the
/// child outlives `kill_timeout`.
///
/// Returns once the child has been reaped and no member of its group is left.
pub async fn terminate(child: &mut Child, kill_timeout: Duration) {
    let Some(pid) = child.id() else {
        // Already reaped.
        return;
    };

    if signal_group(pid, "TERM").await {
        match tokio::time::timeout(kill_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                info!(pid, exit_code = ?status.code(), "backend process stopped");
                sweep_group(pid).await;
                return;
            }
            Ok(Err(err)) => {
                warn!(pid, error = %err, "waiting for backend process failed; killing");
            }
            Err(_) => {
                warn!(
                    pid,
                    timeout_ms = kill_timeout.as_millis() as u64,
                    "backend process ignored SIGTERM; killing"
                );
            }
        }
    }

    signal_group(pid, "KILL").await;
    if let Err(err) = child.kill().await {
        warn!(pid, error = %err, "failed to kill backend process");
    } else {
        info!(pid, "backend process killed");
    }
}

/// SIGKILL whatever is left in the group once its leader is gone.
///
/// The group id stays reserved while any member lives, so this cannot hit an
/// unrelated process.
async fn sweep_group(pid: u32) {
    if signal_group(pid, "KILL").await {
        debug!(pid, "killed leftover processes in the backend's group");
    }
}

/// Send `signal` to the process group led by `pid`.
///
/// False when no member received it or `kill` could not be run.
#[cfg(unix)]
async fn signal_group(pid: u32, signal: &str) -> bool {
    let status = Command::new("kill")
        .arg(format!("-{signal}"))
        .arg("--")
        .arg(format!("-{pid}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) => status.success(),
        Err(err) => {
            debug!(pid, signal, error = %err, "could not run `kill`");
            false
        }
    }
}

#[cfg(not(unix))]
async fn signal_group(_pid: u32, _signal: &str) -> bool {
    false
}
