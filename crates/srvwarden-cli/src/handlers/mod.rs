#![doc = include_str!("README.md")]

//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Errors from the library crates are converted to [`CliError`](crate::CliError)
//!   so `main` can pick an exit code.
//! - Output goes to stdout; diagnostics go through `tracing` to stderr.

use std::time::Duration;

pub mod config;
pub mod install;
pub mod paths;
pub mod query;
pub mod rcon;
pub mod run;

/// How often followed buffers are drained to the terminal.
pub(crate) const FOLLOW_INTERVAL: Duration = Duration::from_millis(250);
