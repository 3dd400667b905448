//! Server-query (A2S) response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Decoded A2S_INFO response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub protocol: u8,
    pub name: String,
    pub map: String,
    pub folder: String,
    pub game: String,
    pub app_id: u16,
    pub players: u8,
    pub max_players: u8,
    pub bots: u8,
    /// `d` dedicated, `l` listen, `p` proxy.
    pub server_type: char,
    /// `l` Linux, `w` Windows, `m`/`o` macOS.
    pub environment: char,
    pub private: bool,
    pub vac: bool,
    pub version: String,
    pub port: Option<u16>,
    pub steam_id: Option<u64>,
    pub keywords: Option<String>,
    pub game_id: Option<u64>,
    /// Network changelist advertised in the keywords trailer.
    pub net_cl: Option<u32>,
}

/// One entry of an A2S_PLAYER response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlayer {
    pub name: String,
    pub score: i32,
    /// Connected time as `HH:MM:SS`.
    pub duration: String,
}

/// Latest combined query results kept by the monitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySnapshot {
    pub info: ServerInfo,
    pub players: Vec<QueryPlayer>,
    pub rules: BTreeMap<String, String>,
}

/// Render a duration in seconds as `HH:MM:SS`; negative or NaN values clamp to zero.
pub fn format_clock(seconds: f32) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
