//! Paths command handler.
//!
//! Displays every resolved location in `key = value` form.

use anyhow::Result;
use srvwarden_core::{DATA_DIR_ENV, data_root, pids_dir};

use crate::bootstrap::CliContext;
use crate::error::CliError;

pub fn execute(ctx: &CliContext) -> Result<()> {
    let root = data_root().map_err(CliError::from)?;
    let pids = pids_dir().map_err(CliError::from)?;

    println!("data_root = {}", root.display());
    println!("config = {}", ctx.config_path.display());
    println!("pids_dir = {}", pids.display());
    if let Some(log) = &ctx.settings.game_log {
        println!("game_log = {}", log.display());
    }
    if std::env::var_os(DATA_DIR_ENV).is_some() {
        println!("# data_root overridden by {DATA_DIR_ENV}");
    }
    Ok(())
}
