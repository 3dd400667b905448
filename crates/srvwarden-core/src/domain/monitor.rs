//! Read-only view of the health monitor's state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::players::PlayerRoster;
use super::query::QuerySnapshot;

/// Lifecycle phase of a health monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorPhase {
    /// Waiting out the start delay.
    #[default]
    Idle,
    Polling,
    /// Terminal.
    Stopped,
}

/// Point-in-time copy of what the monitor knows about the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub phase: MonitorPhase,
    pub started_at: Option<DateTime<Utc>>,
    pub rcon_failing: bool,
    pub query_failing: bool,
    /// Overall liveness verdict.
    ///
    /// Set when RCON fails past its limit, or when A2S fails past its own
    /// limit while RCON is failing. An A2S success sets it to whether RCON
    /// is currently failing, even under the RCON limit. Only an RCON
    /// success clears it while RCON was failing.
    pub down: bool,
    pub last_rcon_success: Option<DateTime<Utc>>,
    pub last_query_success: Option<DateTime<Utc>>,
    pub last_rcon_error: Option<String>,
    pub last_query_error: Option<String>,
    pub roster: PlayerRoster,
    pub query: Option<QuerySnapshot>,
}

impl MonitorSnapshot {
    /// True when both protocols answered on their latest attempt.
    pub const fn is_healthy(&self) -> bool {
        !self.down && !self.rcon_failing && !self.query_failing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_is_idle_and_healthy() {
        let snapshot = MonitorSnapshot::default();
        assert_eq!(snapshot.phase, MonitorPhase::Idle);
        assert!(snapshot.is_healthy());
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let snapshot = MonitorSnapshot {
            rcon_failing: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"rconFailing\":true"));
        assert!(json.contains("\"phase\":\"idle\""));
    }
}
