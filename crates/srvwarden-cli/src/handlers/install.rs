//! Install command handler.
//!
//! Runs steamcmd in the foreground, streaming its output.

use std::sync::Arc;

use anyhow::Result;
use srvwarden_core::{BufferOptions, StreamBuffer};
use srvwarden_runtime::DaemonError;
use srvwarden_runtime::daemon::PIDFILE_NAME;
use srvwarden_runtime::pidfile::{is_our_server, read_pidfile};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::FOLLOW_INTERVAL;
use crate::presentation::Follower;

pub async fn execute(ctx: &CliContext, validate: bool) -> Result<()> {
    let daemon = ctx.daemon()?;

    // A server supervised by another srvwarden process holds the pidfile.
    let pids = srvwarden_core::pids_dir().map_err(CliError::from)?;
    if let Ok(data) = read_pidfile(&pids, PIDFILE_NAME) {
        if is_our_server(data.pid, &ctx.settings.executable) {
            return Err(CliError::from(DaemonError::Running(data.pid)).into());
        }
    }

    let sink = Arc::new(StreamBuffer::new(BufferOptions::transient()));
    let mut follower = Follower::new(Arc::clone(&sink), "");

    let install = daemon.install_or_update(validate, Arc::clone(&sink));
    tokio::pin!(install);

    let mut tick = tokio::time::interval(FOLLOW_INTERVAL);
    let result = loop {
        tokio::select! {
            result = &mut install => break result,
            _ = tick.tick() => {
                follower.print();
            }
        }
    };

    // Lines that arrived after the last tick, then the outcome.
    if follower.print().is_none() && sink.status().is_some() {
        follower.print();
    }
    result.map_err(CliError::from)?;
    Ok(())
}
