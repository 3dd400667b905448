//! Table formatting for CLI output.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use srvwarden_core::{PlayerRecord, PlayerRoster, QueryPlayer, ServerInfo};

/// Truncates a string to `max_len` characters, adding "..." if needed.
///
/// ```rust
/// use srvwarden_cli::presentation::truncate_string;
///
/// assert_eq!(truncate_string("Hello", 10), "Hello");
/// assert_eq!(truncate_string("Hello World", 8), "Hello...");
/// ```
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Format an optional value for table display, returning a default if None.
pub fn format_optional<T: std::fmt::Display>(value: Option<&T>, default: &str) -> String {
    value.map_or_else(|| default.to_string(), ToString::to_string)
}

fn record_rows(out: &mut String, records: &[PlayerRecord]) {
    for r in records {
        let _ = writeln!(
            out,
            "{:>4}  {:<24}  {:<17}  {:<15}  {:>6}",
            r.slot,
            truncate_string(&r.name, 24),
            r.steam_id,
            r.ip,
            r.score
        );
    }
}

/// Players then bots, each under its own heading.
pub fn roster_table(roster: &PlayerRoster) -> String {
    let mut out = String::new();
    if roster.total() == 0 {
        out.push_str("No players connected\n");
        return out;
    }

    let header = format!(
        "{:>4}  {:<24}  {:<17}  {:<15}  {:>6}\n",
        "Slot", "Name", "Steam ID", "IP", "Score"
    );
    for (title, records) in [("Players", &roster.players), ("Bots", &roster.bots)] {
        if records.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{title} ({})", records.len());
        out.push_str(&header);
        record_rows(&mut out, records);
    }
    out
}

/// `key: value` lines for an A2S_INFO response.
pub fn info_table(info: &ServerInfo) -> String {
    let private = if info.private { "yes" } else { "no" };
    let mut rows = vec![
        ("Name", info.name.clone()),
        ("Map", info.map.clone()),
        ("Game", format!("{} ({})", info.game, info.folder)),
        ("App ID", info.app_id.to_string()),
        (
            "Players",
            format!("{}/{} ({} bots)", info.players, info.max_players, info.bots),
        ),
        ("Version", info.version.clone()),
        ("Password", private.to_string()),
        ("Port", format_optional(info.port.as_ref(), "-")),
    ];
    if let Some(keywords) = &info.keywords {
        rows.push(("Keywords", truncate_string(keywords, 60)));
    }

    let mut out = String::new();
    for (key, value) in rows {
        let _ = writeln!(out, "{key:<10} {value}");
    }
    out
}

pub fn query_players_table(players: &[QueryPlayer]) -> String {
    if players.is_empty() {
        return "No players reported\n".to_string();
    }
    let mut out = format!("{:<32}  {:>6}  {:>8}\n", "Name", "Score", "Time");
    for p in players {
        let _ = writeln!(
            out,
            "{:<32}  {:>6}  {:>8}",
            truncate_string(&p.name, 32),
            p.score,
            p.duration
        );
    }
    out
}

pub fn rules_table(rules: &BTreeMap<String, String>) -> String {
    let width = rules.keys().map(String::len).max().unwrap_or(0);
    let mut out = String::new();
    for (key, value) in rules {
        let _ = writeln!(out, "{key:<width$}  {value}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(slot: u32, name: &str, steam_id: &str) -> PlayerRecord {
        PlayerRecord {
            slot,
            name: name.to_string(),
            steam_id: steam_id.to_string(),
            ip: "1.2.3.4".to_string(),
            score: 7,
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_string("Überlänge", 6), "Übe...");
        assert_eq!(truncate_string("abc", 3), "abc");
    }

    #[test]
    fn test_empty_roster() {
        assert_eq!(roster_table(&PlayerRoster::default()), "No players connected\n");
    }

    #[test]
    fn test_roster_sections() {
        let roster = PlayerRoster {
            players: vec![record(0, "Alice", "76561198000000000")],
            bots: vec![record(1, "Drone", "12")],
        };
        let table = roster_table(&roster);
        assert!(table.contains("Players (1)"));
        assert!(table.contains("Bots (1)"));
        assert!(table.contains("Alice"));
    }

    #[test]
    fn test_rules_are_aligned() {
        let rules = BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("longer".to_string(), "2".to_string()),
        ]);
        assert_eq!(rules_table(&rules), "a       1\nlonger  2\n");
    }

    #[test]
    fn test_info_table_rows() {
        let info = ServerInfo {
            name: "Island".to_string(),
            players: 3,
            max_players: 70,
            port: Some(7777),
            ..ServerInfo::default()
        };
        let table = info_table(&info);
        assert!(table.contains("Name       Island"));
        assert!(table.contains("3/70 (0 bots)"));
        assert!(table.contains("Port       7777"));
    }
}
