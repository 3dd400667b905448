//! Signal selection and delivery by pid.

use std::fmt;
use std::io;
use std::str::FromStr;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Signal used to stop the server. Defaults to the forceful one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopSignal {
    /// SIGTERM
    Terminate,
    /// SIGKILL
    #[default]
    Kill,
    /// SIGINT
    Interrupt,
}

#[cfg(unix)]
impl StopSignal {
    const fn as_nix(self) -> Signal {
        match self {
            Self::Terminate => Signal::SIGTERM,
            Self::Kill => Signal::SIGKILL,
            Self::Interrupt => Signal::SIGINT,
        }
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Terminate => "SIGTERM",
            Self::Kill => "SIGKILL",
            Self::Interrupt => "SIGINT",
        })
    }
}

impl FromStr for StopSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().trim_start_matches("SIG") {
            "TERM" | "TERMINATE" => Ok(Self::Terminate),
            "KILL" => Ok(Self::Kill),
            "INT" | "INTERRUPT" => Ok(Self::Interrupt),
            other => Err(format!("unknown signal '{other}'")),
        }
    }
}

/// Deliver `signal` to `pid`.
///
/// Returns `Ok(false)` when the process is already gone.
#[cfg(unix)]
pub fn send_signal(pid: u32, stop: StopSignal) -> io::Result<bool> {
    match signal::kill(Pid::from_raw(pid as i32), stop.as_nix()) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(io::Error::other(e)),
    }
}

#[cfg(not(unix))]
pub fn send_signal(_pid: u32, _stop: StopSignal) -> io::Result<bool> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signals are not supported on this platform",
    ))
}

/// SIGKILL every process left in the group led by `pgid`.
///
/// A group that no longer exists is not an error.
#[cfg(unix)]
pub fn kill_process_group(pgid: u32) -> io::Result<()> {
    match signal::killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::other(e)),
    }
}

#[cfg(not(unix))]
pub fn kill_process_group(_pgid: u32) -> io::Result<()> {
    Ok(())
}

/// Check if a PID exists (without verifying it's our process).
#[cfg(unix)]
pub fn pid_exists(pid: u32) -> bool {
    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        // Exists, but owned by someone else
        Err(_) => true,
    }
}

#[cfg(not(unix))]
pub fn pid_exists(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_signal_names() {
        assert_eq!("term".parse::<StopSignal>(), Ok(StopSignal::Terminate));
        assert_eq!("SIGKILL".parse::<StopSignal>(), Ok(StopSignal::Kill));
        assert_eq!("sigint".parse::<StopSignal>(), Ok(StopSignal::Interrupt));
        assert!("hup".parse::<StopSignal>().is_err());
    }

    #[test]
    fn default_is_forceful() {
        assert_eq!(StopSignal::default(), StopSignal::Kill);
        assert_eq!(StopSignal::default().to_string(), "SIGKILL");
    }

    #[test]
    #[cfg(unix)]
    fn pid_exists_for_self() {
        assert!(pid_exists(std::process::id()));
        assert!(!pid_exists(999_999));
    }

    #[test]
    #[cfg(unix)]
    fn signalling_missing_pid_reports_gone() {
        assert!(!send_signal(999_999, StopSignal::Terminate).unwrap());
        assert!(kill_process_group(999_999).is_ok());
    }
}
