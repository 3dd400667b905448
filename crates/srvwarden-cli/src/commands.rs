//! Subcommands.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the server, keep it alive and follow its output until Ctrl-C
    Run,

    /// Send an administrative command over RCON
    Rcon {
        /// Command and its arguments, e.g. `broadcast Restart in 5 minutes`
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// List connected players and bots over RCON
    Players,

    /// Query the server over A2S
    Query {
        #[command(subcommand)]
        command: QueryCommand,
    },

    /// Install or update the server files with steamcmd
    Install {
        /// Verify every installed file
        #[arg(long)]
        validate: bool,
    },

    /// Inspect or create the settings file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Show resolved paths for all srvwarden files
    Paths,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCommand {
    /// Server name, map, player counts
    Info,
    /// Players as reported by the server browser protocol
    Players,
    /// Server rules (key/value)
    Rules,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective settings (password redacted)
    Show,
    /// Validate the settings
    Check,
    /// Write a settings file with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
