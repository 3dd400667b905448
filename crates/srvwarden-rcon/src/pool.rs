//! Endpoint-keyed connection pool.
//!
//! Two levels of locking: the table lock only guards the endpoint → slot
//! map and is never held across an await; each slot has its own async lock
//! that serializes every request on that endpoint's connection. An empty
//! slot means the connection was evicted and is reopened on next use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

use crate::connection::{RconConnection, RconConnector, TcpConnector};
use crate::error::RconError;

pub(crate) type Slot = Arc<AsyncMutex<Option<RconConnection>>>;

/// Shared pool of authenticated connections, one per endpoint.
pub struct RconPool {
    connector: Arc<dyn RconConnector>,
    read_timeout: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl RconPool {
    pub fn new(connector: Arc<dyn RconConnector>, read_timeout: Duration) -> Self {
        Self {
            connector,
            read_timeout,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Pool over plain TCP.
    pub fn tcp(read_timeout: Duration) -> Self {
        Self::new(Arc::new(TcpConnector::default()), read_timeout)
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Slot for `endpoint`, created empty on first use.
    pub(crate) fn slot(&self, endpoint: &str) -> Slot {
        Arc::clone(self.table().entry(endpoint.to_string()).or_default())
    }

    /// Open and authenticate a fresh connection.
    pub(crate) async fn open(
        &self,
        endpoint: &str,
        password: &str,
    ) -> Result<RconConnection, RconError> {
        RconConnection::open(self.connector.as_ref(), endpoint, password, self.read_timeout).await
    }

    /// Whether a live connection is currently pooled for `endpoint`.
    pub async fn is_connected(&self, endpoint: &str) -> bool {
        let slot = self.table().get(endpoint).cloned();
        match slot {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }

    /// Drop `endpoint` from the pool, closing its connection.
    ///
    /// Waits for any in-flight request on that endpoint to finish.
    pub async fn release(&self, endpoint: &str) -> bool {
        let slot = self.table().remove(endpoint);
        let Some(slot) = slot else {
            return false;
        };

        let conn = slot.lock().await.take();
        match conn {
            Some(conn) => {
                conn.shutdown().await;
                info!(endpoint = %endpoint, "Released RCON connection");
                true
            }
            None => false,
        }
    }

    /// Close every pooled connection.
    pub async fn close_all(&self) {
        let slots: Vec<(String, Slot)> = self.table().drain().collect();
        for (endpoint, slot) in slots {
            if let Some(conn) = slot.lock().await.take() {
                conn.shutdown().await;
                info!(endpoint = %endpoint, "Closed RCON connection");
            }
        }
    }

    /// Number of endpoints known to the pool.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}

impl std::fmt::Debug for RconPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RconPool")
            .field("read_timeout", &self.read_timeout)
            .field("endpoints", &self.len())
            .finish_non_exhaustive()
    }
}
