//! The launch worker: spawn, watch, clean up, relaunch.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use srvwarden_core::ServerSettings;
use srvwarden_query::QueryClient;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::{Channel, DaemonInner, LaunchSnapshot, PIDFILE_NAME};
use crate::checks::{QueryTarget, RconTarget};
use crate::error::DaemonError;
use crate::logtail::LogTailer;
use crate::monitor::{HealthMonitor, MonitorChecks};
use crate::pidfile::{delete_pidfile, write_pidfile};
use crate::shutdown::kill_process_group;
use crate::stream::spawn_stream_reader;

/// Relaunch the server until its generation is stopped.
///
/// A spawn failure ends the loop; the worker table decides whether to try
/// again.
pub(super) async fn launch_loop(inner: Arc<DaemonInner>, generation: u64) {
    debug!(generation, "Launch worker started");

    while inner.should_run(generation) {
        let settings = inner.settings();

        match launch_once(&inner, &settings, generation).await {
            Ok(status) => info!(%status, "Server exited"),
            Err(err) => {
                error!(error = %err, "Server launch failed");
                inner
                    .buffer(Channel::Process)
                    .push(format!("Launch failed: {err}"));
                if let DaemonError::Spawn { path, reason } = err {
                    inner.state().launch_error = Some((path, reason));
                }
                return;
            }
        }

        if !inner.should_run(generation) {
            break;
        }

        let delay = settings.relaunch_delay();
        info!(delay_secs = delay.as_secs(), "Relaunching server after delay");
        tokio::select! {
            () = inner.cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    debug!(generation, "Launch worker finished");
}

fn spawn_error(settings: &ServerSettings, reason: impl ToString) -> DaemonError {
    DaemonError::Spawn {
        path: settings.executable.clone(),
        reason: reason.to_string(),
    }
}

/// One server lifetime.
///
/// A stop that lands between the spawn and the pid being recorded finds no
/// pid to signal, so the child is killed here instead.
async fn launch_once(
    inner: &Arc<DaemonInner>,
    settings: &ServerSettings,
    generation: u64,
) -> Result<ExitStatus, DaemonError> {
    let mut command = Command::new(&settings.executable);
    command
        .args(settings.launch_arguments())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = settings.effective_working_dir() {
        command.current_dir(dir);
    }
    // Own process group so leftovers can be killed together.
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|e| spawn_error(settings, e))?;
    let pid = child
        .id()
        .ok_or_else(|| spawn_error(settings, "exited before reporting a pid"))?;

    let launch = LaunchSnapshot::capture(settings);
    if let Err(e) = write_pidfile(&inner.pids_dir, PIDFILE_NAME, pid, settings.game_port) {
        warn!(pid, error = %e, "Failed to write PID file");
    }

    let process_out = Arc::clone(inner.buffer(Channel::Process));
    process_out.push(format!("Server started (pid {pid})"));
    info!(pid, executable = %settings.executable.display(), "Server started");

    if let Some(stdout) = child.stdout.take() {
        spawn_stream_reader(stdout, pid, "stdout", Arc::clone(&process_out));
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_stream_reader(stderr, pid, "stderr", Arc::clone(&process_out));
    }

    let tail_cancel = inner.cancel.child_token();
    if let Some(log) = &settings.game_log {
        let tailer = LogTailer::new(
            log,
            &settings.rcon_log_marker,
            Arc::clone(inner.buffer(Channel::Rcon)),
        );
        tokio::spawn(tailer.run(tail_cancel.clone()));
    }

    let checks = MonitorChecks {
        rcon: Arc::new(RconTarget::new(
            inner.rcon.clone(),
            launch.rcon_endpoint.clone(),
            launch.rcon_password.clone(),
        )),
        query: Arc::new(QueryTarget::new(
            QueryClient::new(settings.query_timeout()),
            launch.query_endpoint.clone(),
        )),
        restarter: Arc::new(inner.restart.clone()),
    };
    let monitor = Arc::new(HealthMonitor::spawn(
        settings.monitor,
        checks,
        Arc::clone(inner.buffer(Channel::Monitor)),
    ));

    let rcon_endpoint = launch.rcon_endpoint.clone();
    let published = {
        let mut state = inner.state();
        let current = !state.stop_requested
            && state.generation == generation
            && !inner.cancel.is_cancelled();
        if current {
            state.pid = Some(pid);
            state.launch = Some(launch);
            state.launch_error = None;
            state.monitor = Some(Arc::clone(&monitor));
        }
        current
    };
    if !published {
        info!(pid, "Stop arrived during launch, killing server");
        if let Err(e) = child.start_kill() {
            warn!(pid, error = %e, "Failed to kill server");
        }
    }

    let status = child.wait().await;

    if let Err(e) = kill_process_group(pid) {
        warn!(pid, error = %e, "Failed to kill server process group");
    }
    monitor.stop();
    tail_cancel.cancel();
    inner.rcon.pool().release(&rcon_endpoint).await;
    // A newer launch may already own the state after a quick stop/start.
    let owned = {
        let mut state = inner.state();
        let owned = state.pid.is_none_or(|current| current == pid);
        if owned {
            state.pid = None;
            state.launch = None;
        }
        owned
    };
    if owned {
        if let Err(e) = delete_pidfile(&inner.pids_dir, PIDFILE_NAME) {
            warn!(error = %e, "Failed to delete PID file");
        }
    }
    monitor.join().await;

    let status = status.map_err(|e| spawn_error(settings, format!("wait failed: {e}")))?;
    process_out.push(format!("Server exited ({status})"));
    Ok(status)
}
