//! Shared CLI presentation utilities.
//!
//! Format-only: functions here render values for the terminal and never
//! talk to the server.

pub mod follow;
pub mod tables;

pub use follow::Follower;
pub use tables::{
    format_optional, info_table, query_players_table, roster_table, rules_table, truncate_string,
};
