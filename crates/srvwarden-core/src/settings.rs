//! Settings domain types and validation.
//!
//! `ServerSettings` is the configuration snapshot the supervisor, monitor and
//! protocol clients consume. It is loaded from a JSON file; every field has a
//! default so partial files are accepted.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default UDP game port.
pub const DEFAULT_GAME_PORT: u16 = 7777;

/// Default UDP server-query port.
pub const DEFAULT_QUERY_PORT: u16 = 27015;

/// Default TCP RCON port.
pub const DEFAULT_RCON_PORT: u16 = 27020;

/// Placeholders expanded in launch arguments.
const ARG_PLACEHOLDERS: [&str; 4] = [
    "{game_port}",
    "{query_port}",
    "{rcon_port}",
    "{rcon_password}",
];

/// Configuration snapshot for one supervised server instance.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerSettings {
    /// Game server executable.
    pub executable: PathBuf,

    /// Launch arguments. `{game_port}`, `{query_port}`, `{rcon_port}` and
    /// `{rcon_password}` are substituted at launch.
    pub arguments: Vec<String>,

    /// Working directory for the child (defaults to the executable's directory).
    pub working_dir: Option<PathBuf>,

    /// Address used to reach the server's RCON and query ports.
    pub host: String,

    pub game_port: u16,
    pub query_port: u16,
    pub rcon_port: u16,
    pub rcon_password: String,

    /// Log file written by the game, tailed for RCON output.
    pub game_log: Option<PathBuf>,

    /// Text identifying the engine line that introduces RCON output in the game log.
    pub rcon_log_marker: String,

    pub rcon_timeout_ms: u64,
    pub query_timeout_ms: u64,

    /// Pause between a child exit and the next launch.
    pub relaunch_delay_secs: u64,

    pub monitor: MonitorSettings,

    /// Install/update through steamcmd, when configured.
    pub steamcmd: Option<SteamCmdSettings>,
}

/// Health monitor cadence and thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorSettings {
    /// Grace period after launch before polling starts.
    pub start_delay_secs: u64,
    pub poll_interval_secs: u64,
    /// How long RCON may fail before the server is declared down.
    pub rcon_failure_limit_secs: u64,
    /// How long the query port may fail before it counts towards "down".
    pub query_failure_limit_secs: u64,
    /// Restart the server automatically when it is declared down.
    pub auto_recovery: bool,
}

/// steamcmd invocation for install/update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SteamCmdSettings {
    pub executable: PathBuf,
    pub app_id: u32,
    pub install_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::new(),
            arguments: Vec::new(),
            working_dir: None,
            host: "127.0.0.1".to_string(),
            game_port: DEFAULT_GAME_PORT,
            query_port: DEFAULT_QUERY_PORT,
            rcon_port: DEFAULT_RCON_PORT,
            rcon_password: String::new(),
            game_log: None,
            rcon_log_marker: "LogRcon".to_string(),
            rcon_timeout_ms: 5_000,
            query_timeout_ms: 2_000,
            relaunch_delay_secs: 5,
            monitor: MonitorSettings::default(),
            steamcmd: None,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            start_delay_secs: 180,
            poll_interval_secs: 30,
            rcon_failure_limit_secs: 300,
            query_failure_limit_secs: 300,
            auto_recovery: true,
        }
    }
}

impl MonitorSettings {
    pub const fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay_secs)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn rcon_failure_limit(&self) -> Duration {
        Duration::from_secs(self.rcon_failure_limit_secs)
    }

    pub const fn query_failure_limit(&self) -> Duration {
        Duration::from_secs(self.query_failure_limit_secs)
    }
}

impl ServerSettings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write settings as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |e: std::io::Error| SettingsError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, json).map_err(io_err)
    }

    /// `host:port` of the RCON listener.
    pub fn rcon_endpoint(&self) -> String {
        format!("{}:{}", self.host, self.rcon_port)
    }

    /// `host:port` of the server-query listener.
    pub fn query_endpoint(&self) -> String {
        format!("{}:{}", self.host, self.query_port)
    }

    pub const fn rcon_timeout(&self) -> Duration {
        Duration::from_millis(self.rcon_timeout_ms)
    }

    pub const fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub const fn relaunch_delay(&self) -> Duration {
        Duration::from_secs(self.relaunch_delay_secs)
    }

    /// Launch arguments with port and password placeholders expanded.
    pub fn launch_arguments(&self) -> Vec<String> {
        let values = [
            self.game_port.to_string(),
            self.query_port.to_string(),
            self.rcon_port.to_string(),
            self.rcon_password.clone(),
        ];
        self.arguments
            .iter()
            .map(|arg| {
                ARG_PLACEHOLDERS
                    .iter()
                    .zip(&values)
                    .fold(arg.clone(), |acc, (key, value)| acc.replace(key, value))
            })
            .collect()
    }

    /// Directory the child runs in.
    pub fn effective_working_dir(&self) -> Option<PathBuf> {
        self.working_dir
            .clone()
            .or_else(|| self.executable.parent().map(Path::to_path_buf))
            .filter(|dir| !dir.as_os_str().is_empty())
    }
}

impl fmt::Debug for ServerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSettings")
            .field("executable", &self.executable)
            .field("arguments", &self.arguments.len())
            .field("working_dir", &self.working_dir)
            .field("host", &self.host)
            .field("game_port", &self.game_port)
            .field("query_port", &self.query_port)
            .field("rcon_port", &self.rcon_port)
            .field("rcon_password", &"<redacted>")
            .field("game_log", &self.game_log)
            .field("monitor", &self.monitor)
            .field("steamcmd", &self.steamcmd)
            .finish_non_exhaustive()
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Invalid settings file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Server executable is not configured")]
    MissingExecutable,

    #[error("RCON password is not configured")]
    MissingRconPassword,

    #[error("{0} port must be non-zero")]
    InvalidPort(&'static str),

    #[error("Game port and query port must differ, both are {0}")]
    PortConflict(u16),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("{name} ({value}s) must not be shorter than the poll interval ({interval}s)")]
    LimitBelowInterval {
        name: &'static str,
        value: u64,
        interval: u64,
    },

    #[error("steamcmd app id must be non-zero")]
    InvalidAppId,
}

/// Validate settings values.
pub fn validate_settings(settings: &ServerSettings) -> Result<(), SettingsError> {
    if settings.executable.as_os_str().is_empty() {
        return Err(SettingsError::MissingExecutable);
    }

    if settings.rcon_password.is_empty() {
        return Err(SettingsError::MissingRconPassword);
    }

    for (name, port) in [
        ("Game", settings.game_port),
        ("Query", settings.query_port),
        ("RCON", settings.rcon_port),
    ] {
        if port == 0 {
            return Err(SettingsError::InvalidPort(name));
        }
    }

    // Game and query traffic are both UDP on the same host.
    if settings.game_port == settings.query_port {
        return Err(SettingsError::PortConflict(settings.game_port));
    }

    for (name, value) in [
        ("rcon_timeout_ms", settings.rcon_timeout_ms),
        ("query_timeout_ms", settings.query_timeout_ms),
        ("monitor.poll_interval_secs", settings.monitor.poll_interval_secs),
    ] {
        if value == 0 {
            return Err(SettingsError::ZeroDuration(name));
        }
    }

    let interval = settings.monitor.poll_interval_secs;
    for (name, value) in [
        (
            "monitor.rcon_failure_limit_secs",
            settings.monitor.rcon_failure_limit_secs,
        ),
        (
            "monitor.query_failure_limit_secs",
            settings.monitor.query_failure_limit_secs,
        ),
    ] {
        if value < interval {
            return Err(SettingsError::LimitBelowInterval {
                name,
                value,
                interval,
            });
        }
    }

    if settings.steamcmd.as_ref().is_some_and(|s| s.app_id == 0) {
        return Err(SettingsError::InvalidAppId);
    }

    Ok(())
}
