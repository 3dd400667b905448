//! CLI entry point - the composition root.
//!
//! Command dispatch routes to handlers, which talk to the supervisor
//! through the `CliContext` built by bootstrap.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use srvwarden_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::from_cli(&cli)?;

    let Some(command) = cli.command else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    // Bootstrap the CLI context (composition root)
    let ctx = bootstrap(config)?;

    match command {
        Commands::Run => handlers::run::execute(&ctx).await?,
        Commands::Rcon { command } => handlers::rcon::execute(&ctx, &command).await?,
        Commands::Players => handlers::rcon::players(&ctx).await?,
        Commands::Query { command } => handlers::query::execute(&ctx, command).await?,
        Commands::Install { validate } => handlers::install::execute(&ctx, validate).await?,
        Commands::Config { command } => handlers::config::execute(&ctx, command)?,
        Commands::Paths => handlers::paths::execute(&ctx)?,
    }
    Ok(())
}
