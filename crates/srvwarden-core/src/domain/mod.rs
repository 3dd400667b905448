//! Domain types shared by the protocol clients and the runtime.

mod monitor;
mod players;
mod query;

pub use monitor::{MonitorPhase, MonitorSnapshot};
pub use players::{PlayerRecord, PlayerRoster, is_steam_id};
pub use query::{QueryPlayer, QuerySnapshot, ServerInfo, format_clock};
