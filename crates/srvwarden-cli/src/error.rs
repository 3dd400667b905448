//! CLI-specific error types and exit codes.

use srvwarden_core::{PathError, SettingsError};
use srvwarden_query::QueryError;
use srvwarden_runtime::{DaemonError, SupervisionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid command-line input.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The server did not answer or answered badly.
    #[error("Server error: {0}")]
    Remote(String),

    /// Launching or signalling the server failed.
    #[error("Process error: {0}")]
    Process(String),

    /// Supervision gave up.
    #[error("Supervision failed: {0}")]
    Supervision(String),
}

impl CliError {
    /// Map error to an exit code.
    ///
    /// Exit codes follow sysexits.h where one fits:
    /// - 2: invalid arguments
    /// - 69: server unavailable
    /// - 70: internal software error
    /// - 71: OS error
    /// - 74: IO error
    /// - 78: configuration error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments(_) => 2,
            Self::Remote(_) => 69,      // EX_UNAVAILABLE
            Self::Supervision(_) => 70, // EX_SOFTWARE
            Self::Process(_) => 71,     // EX_OSERR
            Self::Io(_) => 74,          // EX_IOERR
            Self::Config(_) => 78,      // EX_CONFIG
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Io { .. } => Self::Io(err.to_string()),
            _ => Self::Config(err.to_string()),
        }
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<DaemonError> for CliError {
    fn from(err: DaemonError) -> Self {
        match err {
            DaemonError::Rcon(_) => Self::Remote(err.to_string()),
            DaemonError::Settings(inner) => inner.into(),
            DaemonError::InstallNotConfigured => Self::Config(err.to_string()),
            DaemonError::NotRunning | DaemonError::Running(_) => Self::Arguments(err.to_string()),
            _ => Self::Process(err.to_string()),
        }
    }
}

impl From<QueryError> for CliError {
    fn from(err: QueryError) -> Self {
        Self::Remote(err.to_string())
    }
}

impl From<SupervisionError> for CliError {
    fn from(err: SupervisionError) -> Self {
        Self::Supervision(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            CliError::Arguments(String::new()),
            CliError::Io(String::new()),
            CliError::Config(String::new()),
            CliError::Remote(String::new()),
            CliError::Process(String::new()),
            CliError::Supervision(String::new()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(CliError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_daemon_error_mapping() {
        assert_eq!(
            CliError::from(DaemonError::InstallNotConfigured).exit_code(),
            78
        );
        assert_eq!(CliError::from(DaemonError::NotRunning).exit_code(), 2);
        assert_eq!(
            CliError::from(DaemonError::Settings(SettingsError::MissingExecutable)).exit_code(),
            78
        );
    }
}
