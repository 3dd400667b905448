//! UDP transport and the public query calls.
//!
//! Every call binds its own socket and keeps no state afterwards.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use srvwarden_core::{QueryPlayer, QuerySnapshot, ServerInfo};
use tokio::net::{UdpSocket, lookup_host};
use tokio::time::timeout;
use tracing::debug;

use crate::error::{ParseError, QueryError};
use crate::reader::Reader;
use crate::wire::{
    A2S_PLAYER, A2S_RULES, SIMPLE_HEADER, SPLIT_HEADER, challenge_request, challenge_token,
};
use crate::{info, players, rules};

/// Largest datagram a server may send.
const MAX_DATAGRAM: usize = 65_535;

/// Split ids with this bit set carry bzip2-compressed payloads.
const SPLIT_COMPRESSED: i32 = i32::MIN;

/// Stateless A2S client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryClient {
    /// Wait for each response.
    pub timeout: Duration,
    /// Sends per request, counting the first.
    pub attempts: usize,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            attempts: 2,
        }
    }
}

impl QueryClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// `A2S_INFO`.
    pub async fn info(&self, endpoint: &str) -> Result<ServerInfo, QueryError> {
        let payload = self.challenged(endpoint, info::request).await?;
        decoded(endpoint, &payload, info::parse)
    }

    /// `A2S_PLAYER`.
    pub async fn players(&self, endpoint: &str) -> Result<Vec<QueryPlayer>, QueryError> {
        let payload = self
            .challenged(endpoint, |token| challenge_request(A2S_PLAYER, token))
            .await?;
        decoded(endpoint, &payload, players::parse)
    }

    /// `A2S_RULES`.
    pub async fn rules(&self, endpoint: &str) -> Result<BTreeMap<String, String>, QueryError> {
        let payload = self
            .challenged(endpoint, |token| challenge_request(A2S_RULES, token))
            .await?;
        decoded(endpoint, &payload, rules::parse)
    }

    /// Info, players and rules in sequence.
    pub async fn snapshot(&self, endpoint: &str) -> Result<QuerySnapshot, QueryError> {
        Ok(QuerySnapshot {
            info: self.info(endpoint).await?,
            players: self.players(endpoint).await?,
            rules: self.rules(endpoint).await?,
        })
    }

    /// Send `build(None)`; when the server answers with a challenge, send
    /// `build(Some(token))` exactly once on the same socket.
    async fn challenged<F>(&self, endpoint: &str, build: F) -> Result<Bytes, QueryError>
    where
        F: Fn(Option<[u8; 4]>) -> Vec<u8>,
    {
        let socket = connect(endpoint).await?;

        let reply = self.exchange(&socket, endpoint, &build(None)).await?;
        let token = challenge_token(&reply).map_err(|e| QueryError::parse(endpoint, e))?;
        let Some(token) = token else {
            return Ok(reply);
        };

        debug!(endpoint = %endpoint, "Answering A2S challenge");
        let reply = self.exchange(&socket, endpoint, &build(Some(token))).await?;
        if matches!(challenge_token(&reply), Ok(Some(_))) {
            return Err(QueryError::parse(endpoint, ParseError::RepeatedChallenge));
        }
        Ok(reply)
    }

    /// Send `request` and wait for one full response, resending on timeout.
    async fn exchange(
        &self,
        socket: &UdpSocket,
        endpoint: &str,
        request: &[u8],
    ) -> Result<Bytes, QueryError> {
        let mut attempt = 0;
        while attempt < self.attempts {
            attempt += 1;
            socket
                .send(request)
                .await
                .map_err(|e| QueryError::io(endpoint, e))?;

            match timeout(self.timeout, receive(socket, endpoint)).await {
                Ok(result) => return result,
                Err(_) => debug!(endpoint = %endpoint, attempt, "A2S request timed out"),
            }
        }

        Err(QueryError::NoResponse {
            endpoint: endpoint.to_string(),
        })
    }
}

async fn connect(endpoint: &str) -> Result<UdpSocket, QueryError> {
    let addr: SocketAddr = lookup_host(endpoint)
        .await
        .map_err(|e| QueryError::io(endpoint, e))?
        .next()
        .ok_or_else(|| QueryError::io(endpoint, "address did not resolve"))?;

    let bind: SocketAddr = if addr.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };

    let socket = UdpSocket::bind(bind)
        .await
        .map_err(|e| QueryError::io(endpoint, e))?;
    socket
        .connect(addr)
        .await
        .map_err(|e| QueryError::io(endpoint, e))?;
    Ok(socket)
}

/// One logical response with its `FF FF FF FF` prefix removed.
async fn receive(socket: &UdpSocket, endpoint: &str) -> Result<Bytes, QueryError> {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut split: Option<SplitAssembly> = None;

    loop {
        let len = socket
            .recv(&mut buf)
            .await
            .map_err(|e| QueryError::io(endpoint, e))?;
        let datagram = Bytes::copy_from_slice(&buf[..len]);

        let header: [u8; 4] = datagram
            .get(..4)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| QueryError::parse(endpoint, ParseError::UnexpectedEnd))?;

        if header == SIMPLE_HEADER {
            return Ok(datagram.slice(4..));
        }
        if header != SPLIT_HEADER {
            return Err(QueryError::parse(endpoint, ParseError::UnknownHeader(header)));
        }

        let fragment =
            Fragment::parse(datagram.slice(4..)).map_err(|e| QueryError::parse(endpoint, e))?;
        let assembly = split.get_or_insert_with(|| SplitAssembly::new(fragment.id, fragment.total));
        if fragment.id != assembly.id {
            debug!(endpoint = %endpoint, id = fragment.id, "Dropping fragment of another response");
            continue;
        }
        if let Some(whole) = assembly
            .add(fragment)
            .map_err(|e| QueryError::parse(endpoint, e))?
        {
            let stripped = whole
                .strip_prefix(&SIMPLE_HEADER)
                .ok_or_else(|| QueryError::parse(endpoint, ParseError::UnexpectedEnd))?;
            return Ok(Bytes::copy_from_slice(stripped));
        }
    }
}

/// Run a body parser, logging the raw payload when it fails.
fn decoded<T>(
    endpoint: &str,
    payload: &Bytes,
    parse: impl FnOnce(Bytes) -> Result<T, ParseError>,
) -> Result<T, QueryError> {
    parse(payload.clone()).map_err(|err| {
        debug!(
            endpoint = %endpoint,
            payload = %format!("{payload:x}"),
            error = %err,
            "Unparseable A2S response"
        );
        QueryError::parse(endpoint, err)
    })
}

/// One fragment of a Source split response.
#[derive(Debug)]
struct Fragment {
    id: i32,
    total: u8,
    number: u8,
    payload: Bytes,
}

impl Fragment {
    fn parse(body: Bytes) -> Result<Self, ParseError> {
        let mut r = Reader::new(body);
        let id = r.i32()?;
        if id & SPLIT_COMPRESSED != 0 {
            return Err(ParseError::CompressedSplit);
        }
        let total = r.u8()?;
        let number = r.u8()?;
        let _size = r.u16()?;
        if number >= total {
            return Err(ParseError::BadFragment { number, total });
        }
        Ok(Self {
            id,
            total,
            number,
            payload: r.rest(),
        })
    }
}

struct SplitAssembly {
    id: i32,
    parts: Vec<Option<Bytes>>,
}

impl SplitAssembly {
    fn new(id: i32, total: u8) -> Self {
        Self {
            id,
            parts: vec![None; usize::from(total)],
        }
    }

    /// Store a fragment; returns the joined payload once every part is in.
    fn add(&mut self, fragment: Fragment) -> Result<Option<BytesMut>, ParseError> {
        let slot = self
            .parts
            .get_mut(usize::from(fragment.number))
            .ok_or(ParseError::BadFragment {
                number: fragment.number,
                total: fragment.total,
            })?;
        *slot = Some(fragment.payload);

        if self.parts.iter().any(Option::is_none) {
            return Ok(None);
        }

        let mut whole = BytesMut::new();
        for part in self.parts.iter().flatten() {
            whole.extend_from_slice(part);
        }
        Ok(Some(whole))
    }
}
