//! Install or update the server files through steamcmd.

use std::process::Stdio;
use std::sync::Arc;

use srvwarden_core::{SteamCmdSettings, StreamBuffer};
use tokio::process::Command;
use tracing::info;

use super::{Daemon, LAUNCH_WORKER};
use crate::error::DaemonError;
use crate::stream::spawn_stream_reader;

/// steamcmd arguments for an anonymous `app_update`.
pub(crate) fn steamcmd_arguments(steam: &SteamCmdSettings, validate: bool) -> Vec<String> {
    let mut args = vec![
        "+force_install_dir".to_string(),
        steam.install_dir.display().to_string(),
        "+login".to_string(),
        "anonymous".to_string(),
        "+app_update".to_string(),
        steam.app_id.to_string(),
    ];
    if validate {
        args.push("validate".to_string());
    }
    args.push("+quit".to_string());
    args
}

impl Daemon {
    /// Run steamcmd's `app_update`, streaming its output into `sink`.
    ///
    /// Refused while a server runs or the launch worker is alive. Once
    /// steamcmd is spawned the sink is finalized with its outcome.
    pub async fn install_or_update(
        &self,
        validate: bool,
        sink: Arc<StreamBuffer>,
    ) -> Result<(), DaemonError> {
        if let Some(pid) = self.pid() {
            return Err(DaemonError::Running(pid));
        }
        if self.inner.workers.is_alive(LAUNCH_WORKER) {
            return Err(DaemonError::Install(
                "the launch worker is active, stop the server first".to_string(),
            ));
        }
        let steam = self
            .settings()
            .steamcmd
            .ok_or(DaemonError::InstallNotConfigured)?;

        let args = steamcmd_arguments(&steam, validate);
        info!(app_id = steam.app_id, validate, dir = %steam.install_dir.display(), "Running steamcmd");
        sink.push(format!("steamcmd {}", args.join(" ")));

        let mut child = Command::new(&steam.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                let err = DaemonError::Spawn {
                    path: steam.executable.clone(),
                    reason: e.to_string(),
                };
                sink.set_status(false, err.to_string());
                err
            })?;

        let pid = child.id().unwrap_or_default();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_stream_reader(stdout, pid, "stdout", Arc::clone(&sink)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_stream_reader(stderr, pid, "stderr", Arc::clone(&sink)));
        }

        let status = child.wait().await;
        for reader in readers {
            let _ = reader.await;
        }

        let failure = match status {
            Ok(status) if status.success() => None,
            Ok(status) => Some(format!("steamcmd exited with {status}")),
            Err(e) => Some(format!("steamcmd wait failed: {e}")),
        };
        match failure {
            None => {
                sink.set_status(true, format!("App {} is up to date", steam.app_id));
                Ok(())
            }
            Some(reason) => {
                sink.set_status(false, reason.clone());
                Err(DaemonError::Install(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn steam() -> SteamCmdSettings {
        SteamCmdSettings {
            executable: PathBuf::from("/opt/steamcmd/steamcmd.sh"),
            app_id: 376_030,
            install_dir: PathBuf::from("/srv/ark"),
        }
    }

    #[test]
    fn arguments_without_validate() {
        assert_eq!(
            steamcmd_arguments(&steam(), false).join(" "),
            "+force_install_dir /srv/ark +login anonymous +app_update 376030 +quit"
        );
    }

    #[test]
    fn validate_goes_after_app_id() {
        let args = steamcmd_arguments(&steam(), true);
        assert_eq!(args[5], "376030");
        assert_eq!(args[6], "validate");
        assert_eq!(args.last().map(String::as_str), Some("+quit"));
    }
}
