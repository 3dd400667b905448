//! Kill orphaned servers by PID without reaping (no Child handle available).

use std::io;

#[cfg(unix)]
use std::time::Duration;
#[cfg(unix)]
use tokio::time::sleep;

#[cfg(unix)]
use super::signal::{StopSignal, pid_exists, send_signal};

/// Polls between escalation steps.
#[cfg(unix)]
const EXIT_POLLS: usize = 20;

#[cfg(unix)]
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Stop a server left behind by a previous daemon with SIGTERM → SIGKILL.
///
/// Each step waits up to two seconds for the pid to disappear. The caller
/// must verify the pid is ours first; this function cannot reap.
///
/// Returns `Ok(())` once the process is gone, including when it was gone
/// before the first signal.
pub async fn kill_pid(pid: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        for stop in [StopSignal::Terminate, StopSignal::Kill] {
            if !send_signal(pid, stop)? {
                return Ok(());
            }
            if wait_for_exit(pid).await {
                return Ok(());
            }
        }

        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("process {pid} did not exit after SIGKILL"),
        ))
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "orphan cleanup not implemented on this platform",
        ))
    }
}

#[cfg(unix)]
async fn wait_for_exit(pid: u32) -> bool {
    for _ in 0..EXIT_POLLS {
        sleep(EXIT_POLL_INTERVAL).await;
        if !pid_exists(pid) {
            return true;
        }
    }
    false
}
