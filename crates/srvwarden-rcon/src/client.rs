//! High-level RCON operations over the pool.

use std::sync::Arc;

use chrono::Local;
use srvwarden_core::{PlayerRoster, StreamBuffer};
use tracing::{debug, warn};

use crate::connection::RconConnection;
use crate::error::{RconError, is_broken_pipe};
use crate::packet::hex;
use crate::players::parse_player_list;
use crate::pool::RconPool;

/// One write plus one reconnect-and-retry after a broken pipe.
const MAX_WRITE_ATTEMPTS: usize = 2;

/// One read plus one retry when nothing arrived in time.
const MAX_READ_ATTEMPTS: usize = 2;

/// Cheap, cloneable handle issuing RCON requests through a shared pool.
#[derive(Debug, Clone)]
pub struct RconClient {
    pool: Arc<RconPool>,
}

impl RconClient {
    pub const fn new(pool: Arc<RconPool>) -> Self {
        Self { pool }
    }

    pub const fn pool(&self) -> &Arc<RconPool> {
        &self.pool
    }

    /// Open (or reopen) the pooled connection for `endpoint` and log in.
    pub async fn authenticate(&self, endpoint: &str, password: &str) -> Result<(), RconError> {
        let slot = self.pool.slot(endpoint);
        let mut guard = slot.lock().await;

        if let Some(old) = guard.take() {
            old.shutdown().await;
        }
        *guard = Some(self.pool.open(endpoint, password).await?);
        Ok(())
    }

    /// Run `command` and return its full reply.
    pub async fn send(
        &self,
        endpoint: &str,
        password: &str,
        command: &str,
    ) -> Result<String, RconError> {
        let slot = self.pool.slot(endpoint);
        let mut guard = slot.lock().await;

        let result = self.exchange(&mut guard, endpoint, password, command).await;
        if let Err(err) = &result {
            if err.evicts_connection() {
                warn!(endpoint = %endpoint, error = %err, "Evicted RCON connection");
            }
        }
        result
    }

    /// [`send`](Self::send) with a transcript written to `sink`.
    ///
    /// The outbound command and every reply line are pushed with a
    /// timestamp. With `finalize`, the sink's status is set from the result.
    pub async fn send_logged(
        &self,
        endpoint: &str,
        password: &str,
        command: &str,
        sink: &StreamBuffer,
        finalize: bool,
    ) -> Result<String, RconError> {
        sink.push(transcript_line('>', command));

        let result = self.send(endpoint, password, command).await;
        match &result {
            Ok(reply) => {
                for line in reply.lines().filter(|l| !l.trim().is_empty()) {
                    sink.push(transcript_line('<', line));
                }
                if finalize {
                    sink.set_status(true, format!("Sent '{command}'"));
                }
            }
            Err(err) => {
                sink.push(transcript_line('!', &err.to_string()));
                if finalize {
                    sink.set_status(false, err.to_string());
                }
            }
        }
        result
    }

    /// `listplayers`, split into players and bots.
    pub async fn list_players_and_bots(
        &self,
        endpoint: &str,
        password: &str,
    ) -> Result<PlayerRoster, RconError> {
        let reply = self.send(endpoint, password, "listplayers").await?;
        parse_player_list(&reply).map_err(|err| {
            debug!(
                endpoint = %endpoint,
                payload = %hex(reply.as_bytes()),
                "Unparseable listplayers reply"
            );
            RconError::parse(endpoint, err)
        })
    }

    /// The request itself, run with the endpoint's slot locked.
    ///
    /// The connection is taken out of the slot and only put back when it is
    /// still usable, so every other exit evicts it.
    async fn exchange(
        &self,
        slot: &mut Option<RconConnection>,
        endpoint: &str,
        password: &str,
        command: &str,
    ) -> Result<String, RconError> {
        let mut conn = match slot.take() {
            Some(conn) => conn,
            None => self.pool.open(endpoint, password).await?,
        };

        let mut attempts = 0;
        let ids = loop {
            attempts += 1;
            match conn.write_command(command).await {
                Ok(ids) => break ids,
                Err(err) if is_broken_pipe(&err) && attempts < MAX_WRITE_ATTEMPTS => {
                    warn!(endpoint = %endpoint, error = %err, "RCON connection broken, reconnecting");
                    conn = self.pool.open(endpoint, password).await?;
                }
                Err(err) => return Err(RconError::connection(endpoint, err)),
            }
        };

        if is_exit(command) {
            conn.shutdown().await;
            return Ok(String::new());
        }

        let mut reads = 0;
        let reply = loop {
            reads += 1;
            match conn.read_reply(ids).await? {
                Some(body) => break Ok(body),
                None if reads < MAX_READ_ATTEMPTS => {
                    debug!(endpoint = %endpoint, "Empty RCON read, retrying");
                }
                None => break Err(RconError::no_response(endpoint)),
            }
        };

        *slot = Some(conn);
        reply
    }
}

fn is_exit(command: &str) -> bool {
    command.trim().eq_ignore_ascii_case("exit")
}

fn transcript_line(direction: char, text: &str) -> String {
    format!(
        "[{}] {direction} {text}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_detection() {
        assert!(is_exit("exit"));
        assert!(is_exit("  EXIT "));
        assert!(!is_exit("exit now"));
    }

    #[test]
    fn test_transcript_line_shape() {
        let line = transcript_line('>', "saveworld");
        assert!(line.starts_with('['));
        assert!(line.ends_with("] > saveworld"));
    }
}
