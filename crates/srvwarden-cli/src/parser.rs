//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Supervise a dedicated game server and talk to it over RCON and A2S.
#[derive(Parser)]
#[command(name = "srvwarden")]
#[command(about = "Supervise a dedicated game server")]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to server.json in the data directory)
    #[arg(long = "config", env = "SRVWARDEN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Override the RCON password from the settings file
    #[arg(
        long = "rcon-password",
        env = "SRVWARDEN_RCON_PASSWORD",
        global = true,
        hide_env_values = true
    )]
    pub rcon_password: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{ConfigCommand, QueryCommand};
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "srvwarden",
            "--verbose",
            "--config",
            "/etc/srvwarden/server.json",
            "paths",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/srvwarden/server.json")));
        assert!(matches!(cli.command, Some(Commands::Paths)));
    }

    #[test]
    fn test_rcon_collects_words() {
        let cli = Cli::parse_from(["srvwarden", "rcon", "broadcast", "restart", "in", "5"]);
        let Some(Commands::Rcon { command }) = cli.command else {
            panic!("expected rcon");
        };
        assert_eq!(command.join(" "), "broadcast restart in 5");
    }

    #[test]
    fn test_nested_subcommands() {
        let cli = Cli::parse_from(["srvwarden", "query", "rules"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Query {
                command: QueryCommand::Rules
            })
        ));

        let cli = Cli::parse_from(["srvwarden", "config", "check"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                command: ConfigCommand::Check
            })
        ));

        let cli = Cli::parse_from(["srvwarden", "install", "--validate"]);
        assert!(matches!(cli.command, Some(Commands::Install { validate: true })));
    }
}
