//! Liveness checks and the restart hook used by the health monitor.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{PlayerRoster, QuerySnapshot};

/// Failure of a single check attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// Nothing came back within the deadline (after retries).
    #[error("No response: {0}")]
    NoResponse(String),

    /// The server rejected the credential.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The connection was reset, closed or refused.
    #[error("Connection fault: {0}")]
    Connection(String),

    /// The response did not have the expected shape.
    #[error("Malformed response: {0}")]
    Parse(String),
}

/// Players/bots query over the administrative protocol.
#[async_trait]
pub trait RconCheck: Send + Sync {
    async fn list_players(&self) -> Result<PlayerRoster, CheckError>;
}

/// Info, players and rules over the server-query protocol.
#[async_trait]
pub trait QueryCheck: Send + Sync {
    async fn query(&self) -> Result<QuerySnapshot, CheckError>;
}

/// Receiver of restart requests raised by the monitor.
///
/// Implementations must not block: the monitor calls this from its poll loop
/// and does not wait for the restart to happen.
pub trait RestartRequester: Send + Sync {
    fn request_restart(&self, reason: &str);
}
