//! The supervisor daemon.
//!
//! Owns the game server's lifecycle: a launch worker spawns the executable,
//! waits for it and relaunches it after a delay until a stop is requested.
//! While a server runs, a health monitor and the game-log tail run beside
//! it. Everything observable goes into three persistent buffers:
//!
//! - [`Channel::Process`]: the child's stdout/stderr and lifecycle notes
//! - [`Channel::Rcon`]: administrative command output from the game log
//! - [`Channel::Monitor`]: health verdict transitions
//!
//! # Concurrency
//!
//! Process state lives behind one std mutex that is never held across an
//! await. Each launch loop carries the generation it was started under; a
//! stop bumps the generation so a loop that outlives its stop cannot
//! relaunch.

mod install;
mod launch;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use srvwarden_core::{
    BufferId, BufferOptions, BufferRegistry, MonitorSnapshot, PlayerRoster, ServerSettings,
    StreamBuffer, strip_ansi,
};
use srvwarden_rcon::{RconClient, RconPool};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::checks::RestartChannel;
use crate::error::{DaemonError, SupervisionError};
use crate::monitor::HealthMonitor;
use crate::pidfile::cleanup_orphaned_servers;
use crate::shutdown::{StopSignal, pid_exists, send_signal};
use crate::workers::{
    DEFAULT_SUPERVISION_INTERVAL, RestartIntensity, WorkerFactory, WorkerTable, run_supervised,
    supervise,
};

pub const LAUNCH_WORKER: &str = "launch";
pub const RESTART_WORKER: &str = "restart-handler";

/// Name of the server's file under the pids directory.
pub const PIDFILE_NAME: &str = "server";

const START_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const START_TIMEOUT: Duration = Duration::from_secs(5);

/// The daemon's persistent output buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Process,
    Rcon,
    Monitor,
}

/// What [`Daemon::restart`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// The running server was killed; the launch worker relaunches it.
    Killed(u32),
    /// Nothing was running, so a server was started.
    Started(u32),
}

/// Connection details captured when a server was launched.
///
/// Administrative commands keep using these even if the settings change
/// while the server runs.
#[derive(Clone)]
struct LaunchSnapshot {
    rcon_endpoint: String,
    rcon_password: String,
    query_endpoint: String,
    launched_at: DateTime<Utc>,
}

impl LaunchSnapshot {
    fn capture(settings: &ServerSettings) -> Self {
        Self {
            rcon_endpoint: settings.rcon_endpoint(),
            rcon_password: settings.rcon_password.clone(),
            query_endpoint: settings.query_endpoint(),
            launched_at: Utc::now(),
        }
    }
}

#[derive(Default)]
struct ProcessState {
    pid: Option<u32>,
    launch: Option<LaunchSnapshot>,
    stop_requested: bool,
    generation: u64,
    monitor: Option<Arc<HealthMonitor>>,
    /// Executable and reason of the latest failed spawn.
    launch_error: Option<(PathBuf, String)>,
}

struct Buffers {
    registry: Arc<BufferRegistry>,
    process: (BufferId, Arc<StreamBuffer>),
    rcon: (BufferId, Arc<StreamBuffer>),
    monitor: (BufferId, Arc<StreamBuffer>),
}

impl Buffers {
    fn new() -> Self {
        let registry = Arc::new(BufferRegistry::new());
        let process = registry.create_buffer(BufferOptions::persistent());
        let rcon = registry.create_buffer(BufferOptions::persistent().with_filter(Arc::new(strip_ansi)));
        let monitor = registry.create_buffer(BufferOptions::persistent());
        Self {
            registry,
            process,
            rcon,
            monitor,
        }
    }

    const fn get(&self, channel: Channel) -> &(BufferId, Arc<StreamBuffer>) {
        match channel {
            Channel::Process => &self.process,
            Channel::Rcon => &self.rcon,
            Channel::Monitor => &self.monitor,
        }
    }
}

struct DaemonInner {
    settings: RwLock<ServerSettings>,
    pids_dir: PathBuf,
    rcon: RconClient,
    buffers: Buffers,
    workers: Arc<WorkerTable>,
    state: Mutex<ProcessState>,
    restart: RestartChannel,
    restart_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    cancel: CancellationToken,
}

impl DaemonInner {
    fn state(&self) -> MutexGuard<'_, ProcessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settings(&self) -> ServerSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn buffer(&self, channel: Channel) -> &Arc<StreamBuffer> {
        &self.buffers.get(channel).1
    }

    /// A launch loop of `generation` may keep relaunching.
    fn should_run(&self, generation: u64) -> bool {
        let state = self.state();
        !state.stop_requested && state.generation == generation && !self.cancel.is_cancelled()
    }
}

/// Handle to the top-level supervision task started by [`Daemon::boot`].
#[derive(Debug)]
pub struct SupervisionHandle {
    task: JoinHandle<Result<(), SupervisionError>>,
}

impl SupervisionHandle {
    /// Resolves when supervision ends: `Ok` after shutdown, an error when
    /// the boundary gave up.
    pub async fn wait(self) -> Result<(), SupervisionError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(SupervisionError::Aborted(e.to_string())),
        }
    }
}

/// Cloneable handle to the supervisor.
#[derive(Clone)]
pub struct Daemon {
    inner: Arc<DaemonInner>,
}

impl Daemon {
    /// Daemon with a TCP RCON pool using the settings' timeout.
    pub fn new(settings: ServerSettings, pids_dir: PathBuf) -> Self {
        let pool = Arc::new(RconPool::tcp(settings.rcon_timeout()));
        Self::with_rcon_client(settings, pids_dir, RconClient::new(pool))
    }

    pub fn with_rcon_client(settings: ServerSettings, pids_dir: PathBuf, rcon: RconClient) -> Self {
        let (restart, restart_rx) = RestartChannel::new();
        Self {
            inner: Arc::new(DaemonInner {
                settings: RwLock::new(settings),
                pids_dir,
                rcon,
                buffers: Buffers::new(),
                workers: Arc::new(WorkerTable::new()),
                state: Mutex::new(ProcessState::default()),
                restart,
                restart_rx: tokio::sync::Mutex::new(restart_rx),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Sweep orphans from a previous run, then start the restart handler
    /// and the supervision loop.
    pub async fn boot(&self) -> SupervisionHandle {
        let settings = self.inner.settings();
        if settings.executable.as_os_str().is_empty() {
            debug!("No executable configured, skipping orphan sweep");
        } else if let Err(e) =
            cleanup_orphaned_servers(&self.inner.pids_dir, &settings.executable).await
        {
            warn!(error = %e, "Orphan sweep failed");
        }

        self.inner
            .workers
            .register(RESTART_WORKER, self.restart_handler_factory());

        let table = Arc::clone(&self.inner.workers);
        let cancel = self.inner.cancel.clone();
        let task = tokio::spawn(async move {
            let loop_cancel = cancel.clone();
            run_supervised(
                "supervision",
                move || supervise(Arc::clone(&table), DEFAULT_SUPERVISION_INTERVAL, loop_cancel.clone()),
                RestartIntensity::default(),
                cancel,
            )
            .await
        });

        info!("Supervisor booted");
        SupervisionHandle { task }
    }

    pub fn settings(&self) -> ServerSettings {
        self.inner.settings()
    }

    /// Replace the settings. A running server keeps its launch-time values
    /// until it is relaunched.
    pub fn update_settings(&self, settings: ServerSettings) {
        *self
            .inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub fn registry(&self) -> &Arc<BufferRegistry> {
        &self.inner.buffers.registry
    }

    pub fn channel(&self, channel: Channel) -> BufferId {
        self.inner.buffers.get(channel).0
    }

    pub fn buffer(&self, channel: Channel) -> Arc<StreamBuffer> {
        Arc::clone(self.inner.buffer(channel))
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.state().pid
    }

    /// A pid is recorded and that process still exists.
    pub fn is_running(&self) -> bool {
        self.pid().is_some_and(pid_exists)
    }

    /// When the running server was launched.
    pub fn launched_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state().launch.as_ref().map(|l| l.launched_at)
    }

    /// Latest snapshot of the current (or last) health monitor.
    pub fn monitor_snapshot(&self) -> Option<MonitorSnapshot> {
        self.inner.state().monitor.as_ref().map(|m| m.snapshot())
    }

    /// Start the server and wait for it to report a pid.
    ///
    /// Returns the current pid straight away when a server is running. When
    /// the launch worker is already alive, waits on it instead of starting
    /// a second one; that wait also covers the relaunch delay the worker
    /// may be sitting in.
    pub async fn start(&self) -> Result<u32, DaemonError> {
        if let Some(pid) = self.pid() {
            return Ok(pid);
        }

        let timeout = if self.inner.workers.is_alive(LAUNCH_WORKER) {
            self.inner.settings().relaunch_delay() + START_TIMEOUT
        } else {
            {
                let mut state = self.inner.state();
                state.stop_requested = false;
                state.launch_error = None;
            }
            self.inner
                .workers
                .register(LAUNCH_WORKER, self.launch_factory());
            START_TIMEOUT
        };

        self.wait_for_pid(timeout).await
    }

    async fn wait_for_pid(&self, timeout: Duration) -> Result<u32, DaemonError> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let state = self.inner.state();
                if let Some(pid) = state.pid {
                    return Ok(pid);
                }
                if let Some((path, reason)) = state.launch_error.clone() {
                    return Err(DaemonError::Spawn { path, reason });
                }
            }
            if Instant::now() >= deadline {
                return Err(DaemonError::StartTimeout(timeout));
            }
            tokio::time::sleep(START_POLL_INTERVAL).await;
        }
    }

    /// Stop the server for good: no relaunch until the next [`start`](Self::start).
    pub fn stop(&self, signal: StopSignal) -> Result<u32, DaemonError> {
        let pid = {
            let mut state = self.inner.state();
            state.stop_requested = true;
            state.generation += 1;
            state.pid.take()
        };
        self.inner.workers.deregister(LAUNCH_WORKER);

        let pid = pid.ok_or(DaemonError::NotRunning)?;
        info!(pid, %signal, "Stopping server");
        self.signal(pid, signal)?;
        self.inner
            .buffer(Channel::Process)
            .push(format!("Stop requested ({signal})"));
        Ok(pid)
    }

    /// Signal the server without stopping supervision; the launch worker
    /// relaunches it after the relaunch delay.
    pub fn kill(&self, signal: StopSignal) -> Result<u32, DaemonError> {
        let pid = self.inner.state().pid.take().ok_or(DaemonError::NotRunning)?;
        info!(pid, %signal, "Killing server for relaunch");
        self.signal(pid, signal)?;
        Ok(pid)
    }

    pub async fn restart(&self) -> Result<RestartOutcome, DaemonError> {
        if self.is_running() {
            self.kill(StopSignal::Kill).map(RestartOutcome::Killed)
        } else {
            self.start().await.map(RestartOutcome::Started)
        }
    }

    fn signal(&self, pid: u32, signal: StopSignal) -> Result<(), DaemonError> {
        match send_signal(pid, signal) {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(pid, "Server already exited");
                Ok(())
            }
            Err(e) => Err(DaemonError::Signal {
                pid,
                reason: e.to_string(),
            }),
        }
    }

    /// RCON endpoint and password of the running server, or of the
    /// settings when nothing runs.
    fn rcon_target(&self) -> (String, String) {
        if let Some(launch) = self.inner.state().launch.clone() {
            return (launch.rcon_endpoint, launch.rcon_password);
        }
        let settings = self.inner.settings();
        (settings.rcon_endpoint(), settings.rcon_password)
    }

    /// Run an administrative command over RCON.
    ///
    /// With a `sink` the transcript goes there and the sink is finalized
    /// with the outcome. Without one it goes to [`Channel::Rcon`].
    pub async fn send_administrative_command(
        &self,
        command: &str,
        sink: Option<&StreamBuffer>,
    ) -> Result<String, DaemonError> {
        let (endpoint, password) = self.rcon_target();
        let reply = match sink {
            Some(sink) => {
                self.inner
                    .rcon
                    .send_logged(&endpoint, &password, command, sink, true)
                    .await?
            }
            None => {
                self.inner
                    .rcon
                    .send_logged(&endpoint, &password, command, self.inner.buffer(Channel::Rcon), false)
                    .await?
            }
        };
        Ok(reply)
    }

    pub async fn broadcast(
        &self,
        message: &str,
        sink: Option<&StreamBuffer>,
    ) -> Result<String, DaemonError> {
        self.send_administrative_command(&format!("broadcast {message}"), sink)
            .await
    }

    pub async fn save_world(&self, sink: Option<&StreamBuffer>) -> Result<String, DaemonError> {
        self.send_administrative_command("saveworld", sink).await
    }

    pub async fn list_players(&self) -> Result<PlayerRoster, DaemonError> {
        let (endpoint, password) = self.rcon_target();
        Ok(self
            .inner
            .rcon
            .list_players_and_bots(&endpoint, &password)
            .await?)
    }

    /// Stop the server, end supervision and close RCON connections.
    pub async fn shutdown(&self) {
        match self.stop(StopSignal::Terminate) {
            Ok(pid) => info!(pid, "Server stopped for shutdown"),
            Err(DaemonError::NotRunning) => {}
            Err(e) => warn!(error = %e, "Failed to stop server during shutdown"),
        }
        self.inner.cancel.cancel();
        self.inner.rcon.pool().close_all().await;
        info!("Supervisor shut down");
    }

    fn launch_factory(&self) -> WorkerFactory {
        let weak = Arc::downgrade(&self.inner);
        Arc::new(move || {
            let weak = Weak::clone(&weak);
            tokio::spawn(async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let generation = inner.state().generation;
                launch::launch_loop(inner, generation).await;
            })
        })
    }

    fn restart_handler_factory(&self) -> WorkerFactory {
        let weak = Arc::downgrade(&self.inner);
        Arc::new(move || {
            let weak = Weak::clone(&weak);
            tokio::spawn(async move {
                if let Some(inner) = weak.upgrade() {
                    restart_handler(Self { inner }).await;
                }
            })
        })
    }
}

/// Turn monitor restart requests into kills; the launch worker does the
/// relaunch.
async fn restart_handler(daemon: Daemon) {
    let cancel = daemon.inner.cancel.clone();
    let mut rx = daemon.inner.restart_rx.lock().await;

    loop {
        let reason = tokio::select! {
            () = cancel.cancelled() => break,
            reason = rx.recv() => match reason {
                Some(reason) => reason,
                None => break,
            },
        };

        warn!(reason = %reason, "Health monitor requested a restart");
        match daemon.kill(StopSignal::Kill) {
            Ok(pid) => daemon
                .inner
                .buffer(Channel::Monitor)
                .push(format!("Killed pid {pid} for restart: {reason}")),
            Err(DaemonError::NotRunning) => debug!("Restart requested but no server is running"),
            Err(e) => warn!(error = %e, "Restart failed"),
        }
    }
    debug!("Restart handler stopped");
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("pid", &self.pid())
            .field("workers", &self.inner.workers)
            .finish_non_exhaustive()
    }
}
