//! RCON packet codec.
//!
//! ```text
//! | size: i32 LE | id: i32 LE | type: i32 LE | body ... | 0x00 | 0x00 |
//! ```
//!
//! `size` counts everything after itself: `4 + 4 + body.len() + 2`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::PacketError;

/// Login request.
pub const SERVERDATA_AUTH: i32 = 3;
/// Command request.
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
/// Login reply. Shares its value with [`SERVERDATA_EXECCOMMAND`].
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
/// Command output.
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// Id the server puts in the auth reply when the password is wrong.
pub const AUTH_FAILED_ID: i32 = -1;

/// Smallest legal `size`: id, type and the two terminators.
pub const MIN_PACKET_SIZE: i32 = 10;

/// Largest `size` accepted from a peer.
pub const MAX_PACKET_SIZE: i32 = 1 << 20;

const HEADER_LEN: usize = 12;

/// One decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    /// Empty response-value packet sent after a command to mark the end of
    /// its (possibly multi-packet) reply.
    pub fn terminator(id: i32) -> Self {
        Self::new(id, SERVERDATA_RESPONSE_VALUE, "")
    }

    /// Value of the `size` field for this packet.
    pub fn size(&self) -> i32 {
        (self.body.len() + 10) as i32
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.body.len() + 14);
        buf.put_i32_le(self.size());
        buf.put_i32_le(self.id);
        buf.put_i32_le(self.kind);
        buf.put_slice(self.body.as_bytes());
        buf.put_u8(0);
        buf.put_u8(0);
        buf.freeze()
    }

    /// Take one complete packet off the front of `buf`.
    ///
    /// Returns `Ok(None)` while the frame is still incomplete. A bad size
    /// is reported before waiting for more bytes.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, PacketError> {
        if buf.len() < 4 {
            return Ok(None);
        }

        let size = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&size) {
            return Err(PacketError::InvalidSize(size));
        }

        let frame_len = 4 + size as usize;
        if buf.len() < frame_len {
            return Ok(None);
        }

        let mut frame = buf.split_to(frame_len);
        frame.advance(4);
        let id = frame.get_i32_le();
        let kind = frame.get_i32_le();

        let body_len = frame.len() - 2;
        if frame[body_len..] != [0, 0] {
            return Err(PacketError::MissingTerminator);
        }
        let body = String::from_utf8_lossy(&frame[..body_len]).into_owned();

        Ok(Some(Self { id, kind, body }))
    }
}

/// Lowercase hex dump used when logging undecodable payloads.
pub(crate) fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
