//! Server-query (A2S) command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::commands::QueryCommand;
use crate::error::CliError;
use crate::presentation::{info_table, query_players_table, rules_table};

pub async fn execute(ctx: &CliContext, command: QueryCommand) -> Result<()> {
    let client = ctx.query_client();
    let endpoint = ctx.settings.query_endpoint();

    let output = match command {
        QueryCommand::Info => info_table(&client.info(&endpoint).await.map_err(CliError::from)?),
        QueryCommand::Players => {
            query_players_table(&client.players(&endpoint).await.map_err(CliError::from)?)
        }
        QueryCommand::Rules => {
            rules_table(&client.rules(&endpoint).await.map_err(CliError::from)?)
        }
    };
    print!("{output}");
    Ok(())
}
