//! Self-healing background workers.
//!
//! Long-lived tasks (launch loop, restart handler) are registered by name
//! with a factory. A supervision loop polls the table and re-invokes the
//! factory for any worker whose task has ended. Each worker has its own
//! restart budget; a worker that keeps dying is dropped from the table.
//!
//! The supervision loop itself runs under [`run_supervised`], which restarts
//! it on panic and gives up, loudly, once its own budget is spent.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::SupervisionError;

/// Restarts allowed per worker within [`DEFAULT_RESTART_WINDOW`].
pub const DEFAULT_MAX_RESTARTS: usize = 5;

pub const DEFAULT_RESTART_WINDOW: Duration = Duration::from_secs(60);

/// How often the table is checked for dead workers.
pub const DEFAULT_SUPERVISION_INTERVAL: Duration = Duration::from_secs(1);

/// Spawns a fresh instance of a worker.
pub type WorkerFactory = Arc<dyn Fn() -> JoinHandle<()> + Send + Sync>;

/// Sliding-window restart budget.
#[derive(Debug, Clone)]
pub struct RestartIntensity {
    max_restarts: usize,
    within: Duration,
    history: VecDeque<Instant>,
}

impl RestartIntensity {
    pub const fn new(max_restarts: usize, within: Duration) -> Self {
        Self {
            max_restarts,
            within,
            history: VecDeque::new(),
        }
    }

    /// Record a restart at `now`. Returns `false` once more than
    /// `max_restarts` fall inside the window.
    pub fn record(&mut self, now: Instant) -> bool {
        while let Some(&oldest) = self.history.front() {
            if now.duration_since(oldest) > self.within {
                self.history.pop_front();
            } else {
                break;
            }
        }
        self.history.push_back(now);
        self.history.len() <= self.max_restarts
    }

    fn exceeded(&self, worker: &str) -> SupervisionError {
        SupervisionError::IntensityExceeded {
            worker: worker.to_string(),
            restarts: self.history.len(),
            within: self.within,
        }
    }
}

impl Default for RestartIntensity {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESTARTS, DEFAULT_RESTART_WINDOW)
    }
}

struct WorkerEntry {
    handle: JoinHandle<()>,
    factory: WorkerFactory,
    intensity: RestartIntensity,
}

/// Named workers and the factories that revive them.
#[derive(Default)]
pub struct WorkerTable {
    workers: Mutex<HashMap<String, WorkerEntry>>,
}

impl WorkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a worker and keep it alive. Replaces any worker of that name;
    /// the old task is left to finish on its own.
    pub fn register(&self, name: &str, factory: WorkerFactory) {
        let handle = factory();
        let entry = WorkerEntry {
            handle,
            factory,
            intensity: RestartIntensity::default(),
        };
        self.lock().insert(name.to_string(), entry);
        debug!(worker = %name, "Worker registered");
    }

    /// Stop supervising `name`. The running task is not aborted.
    pub fn deregister(&self, name: &str) -> bool {
        let removed = self.lock().remove(name).is_some();
        if removed {
            debug!(worker = %name, "Worker deregistered");
        }
        removed
    }

    /// True when `name` is registered and its task has not ended.
    pub fn is_alive(&self, name: &str) -> bool {
        self.lock()
            .get(name)
            .is_some_and(|entry| !entry.handle.is_finished())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// One supervision pass: respawn every dead worker.
    ///
    /// Returns the workers that were given up on for exceeding their
    /// restart budget. They are removed from the table.
    pub fn heal(&self) -> Vec<SupervisionError> {
        let now = Instant::now();
        let mut given_up = Vec::new();
        let mut workers = self.lock();

        workers.retain(|name, entry| {
            if !entry.handle.is_finished() {
                return true;
            }
            if !entry.intensity.record(now) {
                let err = entry.intensity.exceeded(name);
                error!(worker = %name, error = %err, "Worker keeps failing, no longer restarting it");
                given_up.push(err);
                return false;
            }
            warn!(worker = %name, "Worker ended unexpectedly, restarting");
            entry.handle = (entry.factory)();
            true
        });

        given_up
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, WorkerEntry>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for WorkerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerTable")
            .field("workers", &self.names())
            .finish()
    }
}

/// Poll `table` every `interval` until cancelled.
pub async fn supervise(table: Arc<WorkerTable>, interval: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
        table.heal();
    }
    debug!("Supervision loop stopped");
}

/// Top-level boundary: run `make()` as a task, restarting it whenever it
/// ends before `cancel` fires.
///
/// Returns `Ok` on cancellation and an error once `intensity` is spent.
pub async fn run_supervised<F, Fut>(
    name: &str,
    mut make: F,
    mut intensity: RestartIntensity,
    cancel: CancellationToken,
) -> Result<(), SupervisionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        let outcome = tokio::spawn(make()).await;
        if cancel.is_cancelled() {
            return Ok(());
        }

        match outcome {
            Ok(()) => warn!(worker = %name, "Supervised task returned early"),
            Err(e) if e.is_panic() => error!(worker = %name, "Supervised task panicked"),
            Err(e) => warn!(worker = %name, error = %e, "Supervised task was cancelled"),
        }

        if !intensity.record(Instant::now()) {
            let err = intensity.exceeded(name);
            error!(worker = %name, error = %err, "Supervision boundary giving up");
            return Err(err);
        }
        info!(worker = %name, "Restarting supervised task");
    }
}
