//! Run command handler.
//!
//! Boots the supervisor in the foreground, starts the server and streams
//! the process, RCON and monitor channels until Ctrl-C.

use anyhow::Result;
use srvwarden_core::validate_settings;
use srvwarden_runtime::{Channel, Daemon};
use tracing::info;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::FOLLOW_INTERVAL;
use crate::presentation::Follower;

pub async fn execute(ctx: &CliContext) -> Result<()> {
    validate_settings(&ctx.settings).map_err(CliError::from)?;

    let daemon = ctx.daemon()?;
    let supervision = daemon.boot().await;
    let supervision = supervision.wait();
    tokio::pin!(supervision);

    let mut followers = followers(&daemon);

    let pid = match daemon.start().await {
        Ok(pid) => pid,
        Err(e) => {
            drain(&mut followers);
            daemon.shutdown().await;
            return Err(CliError::from(e).into());
        }
    };
    println!("Server started (pid {pid}), press Ctrl-C to stop");

    let mut tick = tokio::time::interval(FOLLOW_INTERVAL);
    loop {
        tokio::select! {
            _ = tick.tick() => drain(&mut followers),
            result = &mut supervision => {
                drain(&mut followers);
                daemon.shutdown().await;
                return result.map_err(|e| CliError::from(e).into());
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    info!("Interrupted, shutting down");
    daemon.shutdown().await;
    let result = supervision.await;
    drain(&mut followers);
    result.map_err(CliError::from)?;
    println!("Server stopped");
    Ok(())
}

fn followers(daemon: &Daemon) -> [Follower; 3] {
    [
        Follower::new(daemon.buffer(Channel::Process), "[server] "),
        Follower::new(daemon.buffer(Channel::Rcon), "[rcon] "),
        Follower::new(daemon.buffer(Channel::Monitor), "[monitor] "),
    ]
}

fn drain(followers: &mut [Follower]) {
    for follower in followers {
        follower.print();
    }
}
