//! CLI bootstrap - the composition root.
//!
//! Resolves the settings file, applies command-line overrides and hands
//! handlers a [`CliContext`]. Handlers build daemons and clients from the
//! context instead of reading files or the environment themselves.

use std::path::PathBuf;

use srvwarden_core::{ServerSettings, config_path, pids_dir};
use srvwarden_query::QueryClient;
use srvwarden_runtime::Daemon;
use tracing::debug;

use crate::error::CliError;
use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub config_path: PathBuf,
    /// Replaces the settings file's RCON password when non-empty.
    pub rcon_password: Option<String>,
}

impl CliConfig {
    /// Config from parsed arguments, falling back to the default settings path.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let config_path = match &cli.config {
            Some(path) => path.clone(),
            None => config_path()?,
        };
        Ok(Self {
            config_path,
            rcon_password: cli.rcon_password.clone(),
        })
    }
}

/// Everything a handler needs.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub settings: ServerSettings,
    pub config_path: PathBuf,
    /// False when the settings file does not exist and defaults are in use.
    pub config_found: bool,
}

impl CliContext {
    pub fn daemon(&self) -> Result<Daemon, CliError> {
        Ok(Daemon::new(self.settings.clone(), pids_dir()?))
    }

    pub fn query_client(&self) -> QueryClient {
        QueryClient::new(self.settings.query_timeout())
    }
}

/// Load settings and apply overrides.
pub fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let config_found = config.config_path.exists();
    let mut settings = if config_found {
        ServerSettings::load(&config.config_path)?
    } else {
        debug!(path = %config.config_path.display(), "No settings file, using defaults");
        ServerSettings::default()
    };

    if let Some(password) = config.rcon_password.filter(|p| !p.is_empty()) {
        debug!("RCON password overridden from the command line or environment");
        settings.rcon_password = password;
    }

    Ok(CliContext {
        settings,
        config_path: config.config_path,
        config_found,
    })
}
