//! Signalling the game server.
//!
//! - `send_signal` / `kill_process_group`: for the live child we launched
//! - `kill_pid`: for orphans left by a previous crash (SIGTERM → SIGKILL)

mod pid;
mod signal;

pub use pid::kill_pid;
pub use signal::{StopSignal, kill_process_group, pid_exists, send_signal};
