//! Parser for the `listplayers` reply.
//!
//! Rows are tab-delimited, each column padded and prefixed with `|`:
//!
//! ```text
//!   | 0\t  | Alice\t  | 76561198000000000\t  | 1.2.3.4\t  | 10
//! ```

use srvwarden_core::{PlayerRecord, PlayerRoster};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerListError {
    #[error("row {row} has {columns} columns, expected at least 5")]
    TooFewColumns { row: usize, columns: usize },

    #[error("row {row} has a non-numeric score {score:?}")]
    InvalidScore { row: usize, score: String },
}

/// Split a `listplayers` reply into players and bots.
///
/// A reply without any tab (e.g. "No Players Connected") is an empty roster.
/// Rows whose first column is not a slot number are headers and skipped.
pub fn parse_player_list(text: &str) -> Result<PlayerRoster, PlayerListError> {
    let mut roster = PlayerRoster::default();
    if !text.contains('\t') {
        return Ok(roster);
    }

    for (row, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let columns: Vec<&str> = line.split('\t').map(clean_column).collect();
        let Some(Ok(slot)) = columns.first().map(|c| c.parse::<u32>()) else {
            continue;
        };

        let [_, name, steam_id, ip, score, ..] = columns.as_slice() else {
            return Err(PlayerListError::TooFewColumns {
                row,
                columns: columns.len(),
            });
        };

        let score = score
            .parse::<i64>()
            .map_err(|_| PlayerListError::InvalidScore {
                row,
                score: (*score).to_string(),
            })?;

        roster.insert(PlayerRecord {
            slot,
            name: (*name).to_string(),
            steam_id: (*steam_id).to_string(),
            ip: (*ip).to_string(),
            score,
        });
    }

    Ok(roster)
}

fn clean_column(raw: &str) -> &str {
    raw.trim().trim_start_matches('|').trim()
}
