//! Config command handlers.

use anyhow::Result;
use srvwarden_core::{ServerSettings, validate_settings};

use crate::bootstrap::CliContext;
use crate::commands::ConfigCommand;
use crate::error::CliError;

const REDACTED: &str = "********";

pub fn execute(ctx: &CliContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Check => check(ctx),
        ConfigCommand::Init { force } => init(ctx, force),
    }
}

fn show(ctx: &CliContext) -> Result<()> {
    if ctx.config_found {
        println!("# {}", ctx.config_path.display());
    } else {
        println!("# {} (not found, showing defaults)", ctx.config_path.display());
    }
    println!("{}", redacted_json(&ctx.settings)?);
    Ok(())
}

fn check(ctx: &CliContext) -> Result<()> {
    if !ctx.config_found {
        return Err(CliError::Config(format!(
            "Settings file {} does not exist, run `srvwarden config init`",
            ctx.config_path.display()
        ))
        .into());
    }
    validate_settings(&ctx.settings).map_err(CliError::from)?;
    println!("✓ Settings in {} are valid", ctx.config_path.display());
    Ok(())
}

fn init(ctx: &CliContext, force: bool) -> Result<()> {
    if ctx.config_path.exists() && !force {
        return Err(CliError::Arguments(format!(
            "{} already exists (use --force to overwrite)",
            ctx.config_path.display()
        ))
        .into());
    }
    ServerSettings::default()
        .save(&ctx.config_path)
        .map_err(CliError::from)?;
    println!("Wrote default settings to {}", ctx.config_path.display());
    println!("Set `executable` and `rcon_password` before running the server.");
    Ok(())
}

/// Pretty JSON with the RCON password masked.
fn redacted_json(settings: &ServerSettings) -> Result<String, CliError> {
    let mut shown = settings.clone();
    if !shown.rcon_password.is_empty() {
        shown.rcon_password = REDACTED.to_string();
    }
    serde_json::to_string_pretty(&shown).map_err(|e| CliError::Config(e.to_string()))
}
