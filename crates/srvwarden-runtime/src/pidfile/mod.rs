//! PID file management for crash recovery.
//!
//! The launch worker records the running server in `<pids_dir>/<name>.pid`.
//! If the daemon dies without cleaning up, the next boot finds the file,
//! verifies the pid still runs the configured executable and stops it.

mod io;
mod sweep;
mod verify;

pub use io::{PidFileData, delete_pidfile, list_pidfiles, read_pidfile, write_pidfile};
pub use sweep::{SweepReport, cleanup_orphaned_servers};
pub use verify::is_our_server;
