#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

mod client;
mod connection;
mod error;
pub mod packet;
mod players;
mod pool;

pub use client::RconClient;
pub use connection::{RconConnection, RconConnector, RconStream, TcpConnector};
pub use error::{PacketError, RconError};
pub use packet::Packet;
pub use players::{PlayerListError, parse_player_list};
pub use pool::RconPool;
