//! Daemon and supervision errors.

use std::path::PathBuf;
use std::time::Duration;

use srvwarden_core::SettingsError;
use srvwarden_rcon::RconError;
use thiserror::Error;

/// Failure of a daemon operation.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Server is not running")]
    NotRunning,

    #[error("Server is running (pid {0}), stop it first")]
    Running(u32),

    #[error("Server did not report a pid within {0:?}")]
    StartTimeout(Duration),

    #[error("Failed to launch {path}: {reason}")]
    Spawn { path: PathBuf, reason: String },

    #[error("Failed to signal pid {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    #[error("steamcmd is not configured")]
    InstallNotConfigured,

    #[error("steamcmd failed: {0}")]
    Install(String),

    #[error(transparent)]
    Rcon(#[from] RconError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// The top-level supervision boundary gave up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisionError {
    #[error("{worker} failed {restarts} times within {within:?}, giving up")]
    IntensityExceeded {
        worker: String,
        restarts: usize,
        within: Duration,
    },

    #[error("Supervision task aborted: {0}")]
    Aborted(String),
}
