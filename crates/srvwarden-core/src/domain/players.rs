//! Connected-player records reported by the RCON `listplayers` command.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static STEAM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{17}$").expect("steam id pattern is valid"));

/// Whether `id` looks like a 64-bit Steam id (17 decimal digits).
pub fn is_steam_id(id: &str) -> bool {
    STEAM_ID.is_match(id)
}

/// One row of the player table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub slot: u32,
    pub name: String,
    pub steam_id: String,
    pub ip: String,
    pub score: i64,
}

/// Player table split into humans (real Steam ids) and bots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRoster {
    pub players: Vec<PlayerRecord>,
    pub bots: Vec<PlayerRecord>,
}

impl PlayerRoster {
    /// File a record under players or bots by its id.
    pub fn insert(&mut self, record: PlayerRecord) {
        if is_steam_id(&record.steam_id) {
            self.players.push(record);
        } else {
            self.bots.push(record);
        }
    }

    pub fn total(&self) -> usize {
        self.players.len() + self.bots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(steam_id: &str) -> PlayerRecord {
        PlayerRecord {
            slot: 0,
            name: "x".to_string(),
            steam_id: steam_id.to_string(),
            ip: "127.0.0.1".to_string(),
            score: 0,
        }
    }

    #[test]
    fn test_steam_id_shape() {
        assert!(is_steam_id("76561198000000000"));
        assert!(!is_steam_id("7656119800000000"));
        assert!(!is_steam_id("765611980000000001"));
        assert!(!is_steam_id("BOT01"));
    }

    #[test]
    fn test_roster_classification() {
        let mut roster = PlayerRoster::default();
        roster.insert(record("76561198000000000"));
        roster.insert(record("1234"));
        assert_eq!(roster.players.len(), 1);
        assert_eq!(roster.bots.len(), 1);
        assert_eq!(roster.total(), 2);
    }
}
