//! Liveness monitor for a running game server.
//!
//! After a start delay the monitor polls RCON (`listplayers`) then A2S every
//! poll interval. RCON is the authoritative signal: only RCON failing past
//! its limit requests a restart, and an A2S success cannot clear `down`
//! while RCON is failing.
//!
//! ```text
//! Idle ──start delay──▶ Polling ──stop──▶ Stopped
//!   └──────────────stop──────────────────▶
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{Local, Utc};
use srvwarden_core::{
    CheckError, MonitorPhase, MonitorSettings, MonitorSnapshot, PlayerRoster, QueryCheck,
    QuerySnapshot, RconCheck, RestartRequester, StreamBuffer,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The monitor's collaborators.
#[derive(Clone)]
pub struct MonitorChecks {
    pub rcon: Arc<dyn RconCheck>,
    pub query: Arc<dyn QueryCheck>,
    pub restarter: Arc<dyn RestartRequester>,
}

/// Verdict bookkeeping, separate from the loop so it can be driven directly.
#[derive(Debug, Clone)]
struct Verdict {
    snapshot: MonitorSnapshot,
    /// Last RCON success, or the start of polling.
    rcon_since: Instant,
    query_since: Instant,
    /// Set once per RCON outage.
    restart_requested: bool,
}

/// What a check result changed.
#[derive(Debug, Default, PartialEq, Eq)]
struct Outcome {
    /// Line for the monitor log when `down` flipped.
    transition: Option<String>,
    restart: Option<String>,
}

impl Verdict {
    fn idle(now: Instant) -> Self {
        Self {
            snapshot: MonitorSnapshot::default(),
            rcon_since: now,
            query_since: now,
            restart_requested: false,
        }
    }

    fn begin_polling(&mut self, now: Instant) {
        self.snapshot.phase = MonitorPhase::Polling;
        self.snapshot.started_at = Some(Utc::now());
        self.rcon_since = now;
        self.query_since = now;
    }

    fn rcon_ok(&mut self, roster: PlayerRoster, now: Instant) -> Outcome {
        self.snapshot.rcon_failing = false;
        self.snapshot.roster = roster;
        self.snapshot.last_rcon_success = Some(Utc::now());
        self.rcon_since = now;
        self.restart_requested = false;
        Outcome {
            transition: self.set_down(false, "RCON is responding"),
            restart: None,
        }
    }

    fn rcon_failed(
        &mut self,
        err: &CheckError,
        now: Instant,
        limit: Duration,
        auto_recovery: bool,
    ) -> Outcome {
        self.snapshot.rcon_failing = true;
        self.snapshot.last_rcon_error = Some(err.to_string());

        let silent_for = now.duration_since(self.rcon_since);
        if silent_for <= limit {
            return Outcome::default();
        }

        let reason = format!("RCON has failed for {}s: {err}", silent_for.as_secs());
        let transition = self.set_down(true, &reason);
        let restart = (auto_recovery && !self.restart_requested).then(|| {
            self.restart_requested = true;
            reason
        });
        Outcome { transition, restart }
    }

    fn query_ok(&mut self, snapshot: QuerySnapshot, now: Instant) -> Outcome {
        self.snapshot.query_failing = false;
        self.snapshot.query = Some(snapshot);
        self.snapshot.last_query_success = Some(Utc::now());
        self.query_since = now;

        let down = self.snapshot.rcon_failing;
        Outcome {
            transition: self.set_down(down, "A2S is responding but RCON is not"),
            restart: None,
        }
    }

    fn query_failed(&mut self, err: &CheckError, now: Instant, limit: Duration) -> Outcome {
        self.snapshot.query_failing = true;
        self.snapshot.last_query_error = Some(err.to_string());

        let silent_for = now.duration_since(self.query_since);
        if silent_for <= limit || !self.snapshot.rcon_failing {
            return Outcome::default();
        }
        Outcome {
            transition: self.set_down(
                true,
                &format!("A2S has failed for {}s: {err}", silent_for.as_secs()),
            ),
            restart: None,
        }
    }

    fn set_down(&mut self, down: bool, reason: &str) -> Option<String> {
        if self.snapshot.down == down {
            return None;
        }
        self.snapshot.down = down;
        Some(if down {
            format!("Server is down: {reason}")
        } else {
            format!("Server is up: {reason}")
        })
    }
}

struct Shared {
    settings: MonitorSettings,
    checks: MonitorChecks,
    sink: Arc<StreamBuffer>,
    verdict: Mutex<Verdict>,
}

impl Shared {
    fn verdict(&self) -> std::sync::MutexGuard<'_, Verdict> {
        self.verdict.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, outcome: Outcome) {
        if let Some(line) = outcome.transition {
            info!(verdict = %line, "Health verdict changed");
            self.sink.push(monitor_line(&line));
        }
        if let Some(reason) = outcome.restart {
            warn!(reason = %reason, "Requesting server restart");
            self.sink.push(monitor_line(&format!("Requesting restart: {reason}")));
            self.checks.restarter.request_restart(&reason);
        }
    }

    async fn poll_rcon(&self) {
        let result = self.checks.rcon.list_players().await;
        let now = Instant::now();
        let outcome = match result {
            Ok(roster) => self.verdict().rcon_ok(roster, now),
            Err(err) => {
                debug!(error = %err, "RCON check failed");
                self.verdict().rcon_failed(
                    &err,
                    now,
                    self.settings.rcon_failure_limit(),
                    self.settings.auto_recovery,
                )
            }
        };
        self.apply(outcome);
    }

    async fn poll_query(&self) {
        let result = self.checks.query.query().await;
        let now = Instant::now();
        let outcome = match result {
            Ok(snapshot) => self.verdict().query_ok(snapshot, now),
            Err(err) => {
                debug!(error = %err, "A2S check failed");
                self.verdict()
                    .query_failed(&err, now, self.settings.query_failure_limit())
            }
        };
        self.apply(outcome);
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let stopped = tokio::select! {
            () = cancel.cancelled() => true,
            () = tokio::time::sleep(self.settings.start_delay()) => false,
        };

        if !stopped {
            self.sink.reset();
            self.verdict().begin_polling(Instant::now());
            info!(
                interval_secs = self.settings.poll_interval_secs,
                "Health monitor polling"
            );
            self.poll_loop(&cancel).await;
        }

        self.verdict().snapshot.phase = MonitorPhase::Stopped;
        self.sink.set_status(true, "Health monitor stopped");
        debug!("Health monitor stopped");
    }

    /// Each cycle sleeps for what is left of the interval after probing.
    /// In-flight checks are allowed to finish.
    async fn poll_loop(&self, cancel: &CancellationToken) {
        let interval = self.settings.poll_interval();
        loop {
            let cycle_start = Instant::now();
            self.poll_rcon().await;
            if cancel.is_cancelled() {
                return;
            }
            self.poll_query().await;

            let pause = interval.saturating_sub(cycle_start.elapsed());
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(pause) => {}
            }
        }
    }
}

fn monitor_line(text: &str) -> String {
    format!("[{}] {text}", Local::now().format("%Y-%m-%d %H:%M:%S"))
}

/// Handle to a spawned monitor task.
pub struct HealthMonitor {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    /// Start monitoring; the monitor begins in [`MonitorPhase::Idle`].
    pub fn spawn(settings: MonitorSettings, checks: MonitorChecks, sink: Arc<StreamBuffer>) -> Self {
        let shared = Arc::new(Shared {
            settings,
            checks,
            sink,
            verdict: Mutex::new(Verdict::idle(Instant::now())),
        });
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&shared).run(cancel.clone()));

        Self {
            shared,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.shared.verdict().snapshot.clone()
    }

    /// Ask the monitor to stop after any in-flight check.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task to finish. Later calls return immediately.
    pub async fn join(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Health monitor task failed");
            }
        }
    }
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("phase", &self.snapshot().phase)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
