//! Canonical locations for srvwarden state.
//!
//! - Settings file
//! - PID files for the supervised game server
//!
//! Returns `PathBuf` and `PathError`; nothing here prompts or prints.

mod error;
mod platform;

use std::path::PathBuf;

pub use error::PathError;
pub use platform::{DATA_DIR_ENV, data_root, normalize_user_path};

/// Default settings file: `<data root>/server.json`.
pub fn config_path() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join("server.json"))
}

/// Directory where PID files are stored, created on demand.
pub fn pids_dir() -> Result<PathBuf, PathError> {
    platform::ensure_dir(data_root()?.join("pids"))
}
