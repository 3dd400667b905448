//! A single authenticated RCON session.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::RconError;
use crate::packet::{
    AUTH_FAILED_ID, Packet, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE, SERVERDATA_EXECCOMMAND,
    SERVERDATA_RESPONSE_VALUE, hex,
};

/// Byte stream an RCON session runs over.
pub trait RconStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> RconStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Opens transports to an endpoint.
#[async_trait]
pub trait RconConnector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> io::Result<Box<dyn RconStream>>;
}

/// Plain TCP transport.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    pub connect_timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl RconConnector for TcpConnector {
    async fn connect(&self, endpoint: &str) -> io::Result<Box<dyn RconStream>> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(endpoint))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}

/// Ids of an in-flight command and the terminator that ends its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RequestIds {
    pub command: i32,
    pub terminator: i32,
}

/// Authenticated connection to one endpoint.
///
/// Not internally synchronized: the pool hands each connection to one
/// caller at a time.
pub struct RconConnection {
    endpoint: String,
    stream: Box<dyn RconStream>,
    read_buf: BytesMut,
    last_id: i32,
    timeout: Duration,
}

impl RconConnection {
    /// Connect and log in.
    pub async fn open(
        connector: &dyn RconConnector,
        endpoint: &str,
        password: &str,
        read_timeout: Duration,
    ) -> Result<Self, RconError> {
        debug!(endpoint = %endpoint, "Opening RCON connection");
        let stream = connector
            .connect(endpoint)
            .await
            .map_err(|e| RconError::connection(endpoint, e))?;

        let mut conn = Self::from_stream(endpoint, stream, read_timeout);
        conn.authenticate(password).await?;
        Ok(conn)
    }

    /// Wrap an already connected stream without logging in.
    pub fn from_stream(endpoint: &str, stream: Box<dyn RconStream>, read_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            stream,
            read_buf: BytesMut::with_capacity(4096),
            last_id: 0,
            timeout: read_timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Next request id. Monotonic, never 0 or -1.
    fn next_id(&mut self) -> i32 {
        self.last_id = if self.last_id >= i32::MAX - 1 {
            1
        } else {
            self.last_id + 1
        };
        self.last_id
    }

    /// Send the auth packet and wait for the verdict.
    ///
    /// Empty response-value packets sent ahead of the auth reply are skipped.
    pub async fn authenticate(&mut self, password: &str) -> Result<(), RconError> {
        let id = self.next_id();
        let packet = Packet::new(id, SERVERDATA_AUTH, password).encode();
        self.write_all(&packet)
            .await
            .map_err(|e| RconError::connection(&self.endpoint, e))?;

        loop {
            let Some(reply) = self.read_packet().await? else {
                return Err(RconError::no_response(&self.endpoint));
            };

            if reply.kind != SERVERDATA_AUTH_RESPONSE {
                trace!(endpoint = %self.endpoint, id = reply.id, "Skipping pre-auth packet");
                continue;
            }
            if reply.id == AUTH_FAILED_ID {
                return Err(RconError::Authentication {
                    endpoint: self.endpoint.clone(),
                });
            }
            if reply.id == id {
                debug!(endpoint = %self.endpoint, "RCON authenticated");
                return Ok(());
            }
        }
    }

    /// Write a command followed by its terminator.
    pub(crate) async fn write_command(&mut self, command: &str) -> io::Result<RequestIds> {
        let ids = RequestIds {
            command: self.next_id(),
            terminator: self.next_id(),
        };

        let mut out = BytesMut::with_capacity(command.len() + 28);
        out.put(Packet::new(ids.command, SERVERDATA_EXECCOMMAND, command).encode());
        out.put(Packet::terminator(ids.terminator).encode());
        self.write_all(&out).await?;
        Ok(ids)
    }

    /// Collect the reply to `ids`.
    ///
    /// `Ok(None)` means nothing for this command arrived before the read
    /// timed out. A reply whose terminator never arrives is returned as-is once
    /// the read times out.
    pub(crate) async fn read_reply(&mut self, ids: RequestIds) -> Result<Option<String>, RconError> {
        let mut body = String::new();
        let mut received = false;

        loop {
            let Some(packet) = self.read_packet().await? else {
                return Ok(received.then_some(body));
            };

            if packet.id == ids.terminator {
                return Ok(Some(body));
            }
            if packet.id == ids.command && packet.kind == SERVERDATA_RESPONSE_VALUE {
                received = true;
                body.push_str(&packet.body);
            } else {
                trace!(endpoint = %self.endpoint, id = packet.id, "Ignoring stray RCON packet");
            }
        }
    }

    /// Close the transport. Errors are irrelevant at this point.
    pub async fn shutdown(mut self) {
        let _ = self.stream.shutdown().await;
        debug!(endpoint = %self.endpoint, "RCON connection closed");
    }

    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let limit = self.timeout;
        let stream = &mut self.stream;
        let write = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        };
        timeout(limit, write)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write timed out"))?
    }

    /// Next packet, or `None` when the read timed out.
    async fn read_packet(&mut self) -> Result<Option<Packet>, RconError> {
        loop {
            match Packet::decode(&mut self.read_buf) {
                Ok(Some(packet)) => return Ok(Some(packet)),
                Ok(None) => {}
                Err(err) => {
                    debug!(
                        endpoint = %self.endpoint,
                        payload = %hex(&self.read_buf),
                        "Undecodable RCON frame"
                    );
                    self.read_buf.clear();
                    return Err(RconError::parse(&self.endpoint, err));
                }
            }

            match timeout(self.timeout, self.stream.read_buf(&mut self.read_buf)).await {
                Err(_) => return Ok(None),
                Ok(Ok(0)) => {
                    return Err(RconError::connection(
                        &self.endpoint,
                        "connection closed by peer",
                    ));
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => return Err(RconError::connection(&self.endpoint, err)),
            }
        }
    }
}

impl std::fmt::Debug for RconConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RconConnection")
            .field("endpoint", &self.endpoint)
            .field("last_id", &self.last_id)
            .finish_non_exhaustive()
    }
}
