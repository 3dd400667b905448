//! Monitor ports wired to the real clients.

use std::fmt;

use async_trait::async_trait;
use srvwarden_core::{
    CheckError, PlayerRoster, QueryCheck, QuerySnapshot, RconCheck, RestartRequester,
};
use srvwarden_query::QueryClient;
use srvwarden_rcon::RconClient;
use tokio::sync::mpsc;
use tracing::warn;

/// `listplayers` against one server through the shared pool.
#[derive(Clone)]
pub struct RconTarget {
    client: RconClient,
    endpoint: String,
    password: String,
}

impl RconTarget {
    pub fn new(client: RconClient, endpoint: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for RconTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RconTarget")
            .field("endpoint", &self.endpoint)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RconCheck for RconTarget {
    async fn list_players(&self) -> Result<PlayerRoster, CheckError> {
        self.client
            .list_players_and_bots(&self.endpoint, &self.password)
            .await
            .map_err(CheckError::from)
    }
}

/// Full A2S snapshot of one server.
#[derive(Debug, Clone)]
pub struct QueryTarget {
    client: QueryClient,
    endpoint: String,
}

impl QueryTarget {
    pub fn new(client: QueryClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl QueryCheck for QueryTarget {
    async fn query(&self) -> Result<QuerySnapshot, CheckError> {
        self.client
            .snapshot(&self.endpoint)
            .await
            .map_err(CheckError::from)
    }
}

/// Forwards restart requests to the daemon's restart handler.
#[derive(Debug, Clone)]
pub struct RestartChannel {
    tx: mpsc::UnboundedSender<String>,
}

impl RestartChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RestartRequester for RestartChannel {
    fn request_restart(&self, reason: &str) {
        if self.tx.send(reason.to_string()).is_err() {
            warn!(reason, "Restart handler is gone, dropping restart request");
        }
    }
}
