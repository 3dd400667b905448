//! Startup orphan cleanup for servers left by a previous daemon.

use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use super::io::{delete_pidfile, list_pidfiles};
use super::verify::is_our_server;
use crate::shutdown::kill_pid;

/// Outcome of [`cleanup_orphaned_servers`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Verified orphans that were stopped.
    pub killed: usize,
    /// Stale files removed without signalling anything.
    pub cleaned: usize,
}

/// Stop orphaned servers recorded in `dir` and remove their pid files.
///
/// Only pids whose executable is `executable` are signalled. Everything
/// else just loses its pid file.
pub async fn cleanup_orphaned_servers(dir: &Path, executable: &Path) -> io::Result<SweepReport> {
    let pidfiles = list_pidfiles(dir)?;
    let mut report = SweepReport::default();

    if pidfiles.is_empty() {
        debug!("No orphaned PID files found");
        return Ok(report);
    }

    info!(count = pidfiles.len(), "Checking PID files for orphaned servers");

    for (name, data) in pidfiles {
        if is_our_server(data.pid, executable) {
            debug!(name = %name, pid = data.pid, port = data.port, "Killing orphaned server");
            match kill_pid(data.pid).await {
                Ok(()) => report.killed += 1,
                Err(e) => {
                    warn!(pid = data.pid, error = %e, "Failed to kill orphaned server, removing stale PID file");
                    report.cleaned += 1;
                }
            }
        } else {
            debug!(name = %name, pid = data.pid, "PID is not our server, removing stale PID file");
            report.cleaned += 1;
        }
        delete_pidfile(dir, &name)?;
    }

    info!(
        killed = report.killed,
        cleaned = report.cleaned,
        "Orphan cleanup complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pidfile::io::write_pidfile;

    #[tokio::test]
    async fn stale_pidfiles_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        write_pidfile(dir.path(), "server", 999_999, 7777).unwrap();

        let report = cleanup_orphaned_servers(dir.path(), Path::new("/nonexistent/server"))
            .await
            .unwrap();

        assert_eq!(report, SweepReport { killed: 0, cleaned: 1 });
        assert!(list_pidfiles(dir.path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_live_pid_is_not_signalled() {
        let dir = tempfile::tempdir().unwrap();
        write_pidfile(dir.path(), "server", std::process::id(), 7777).unwrap();

        let report = cleanup_orphaned_servers(dir.path(), Path::new("/nonexistent/server"))
            .await
            .unwrap();

        assert_eq!(report.killed, 0);
        assert_eq!(report.cleaned, 1);
    }
}
