//! Port definitions (trait abstractions) for the health monitor's collaborators.
//!
//! The monitor only sees these traits. The runtime wires them to the real
//! RCON pool, the A2S client and the daemon's restart channel; tests wire
//! them to scripted fakes.
//!
//! # Design Rules
//!
//! - No socket or process types in any signature
//! - Errors are flattened to [`CheckError`] with human-readable messages
//! - Messages never carry credentials

mod checks;

pub use checks::{CheckError, QueryCheck, RconCheck, RestartRequester};
