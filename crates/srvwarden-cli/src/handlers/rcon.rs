//! RCON command handlers.

use anyhow::Result;
use srvwarden_core::SettingsError;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::roster_table;

/// Send one administrative command and print the reply.
pub async fn execute(ctx: &CliContext, words: &[String]) -> Result<()> {
    require_password(ctx)?;
    let command = words.join(" ");

    let daemon = ctx.daemon()?;
    let reply = daemon
        .send_administrative_command(&command, None)
        .await
        .map_err(CliError::from)?;

    let reply = reply.trim_end();
    if reply.is_empty() {
        println!("(no output)");
    } else {
        println!("{reply}");
    }
    Ok(())
}

/// `listplayers` as a table of players and bots.
pub async fn players(ctx: &CliContext) -> Result<()> {
    require_password(ctx)?;
    let daemon = ctx.daemon()?;
    let roster = daemon.list_players().await.map_err(CliError::from)?;
    print!("{}", roster_table(&roster));
    Ok(())
}

fn require_password(ctx: &CliContext) -> Result<(), CliError> {
    if ctx.settings.rcon_password.is_empty() {
        return Err(SettingsError::MissingRconPassword.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use srvwarden_core::ServerSettings;
    use std::path::PathBuf;

    #[test]
    fn test_missing_password_is_config_error() {
        let ctx = CliContext {
            settings: ServerSettings::default(),
            config_path: PathBuf::from("server.json"),
            config_found: false,
        };
        let err = require_password(&ctx).unwrap_err();
        assert_eq!(err.exit_code(), 78);
    }
}
