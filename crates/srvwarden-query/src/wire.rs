//! Packet headers and message type bytes.

use crate::error::ParseError;
use crate::reader::Reader;

/// Prefix of every request and of single-packet responses.
pub(crate) const SIMPLE_HEADER: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
/// Prefix of split-response fragments.
pub(crate) const SPLIT_HEADER: [u8; 4] = [0xFE, 0xFF, 0xFF, 0xFF];

pub(crate) const A2S_INFO: u8 = 0x54;
pub(crate) const A2S_PLAYER: u8 = 0x55;
pub(crate) const A2S_RULES: u8 = 0x56;

pub(crate) const S2C_CHALLENGE: u8 = 0x41;
pub(crate) const S2A_INFO: u8 = 0x49;
pub(crate) const S2A_PLAYER: u8 = 0x44;
pub(crate) const S2A_RULES: u8 = 0x45;

/// Token sent when asking for a challenge.
pub(crate) const NO_CHALLENGE: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

/// Request for a challenged query type (`A2S_PLAYER`, `A2S_RULES`).
pub(crate) fn challenge_request(kind: u8, token: Option<[u8; 4]>) -> Vec<u8> {
    let mut out = Vec::with_capacity(9);
    out.extend_from_slice(&SIMPLE_HEADER);
    out.push(kind);
    out.extend_from_slice(&token.unwrap_or(NO_CHALLENGE));
    out
}

pub(crate) fn expect_type(r: &mut Reader, expected: u8) -> Result<(), ParseError> {
    let found = r.u8()?;
    if found == expected {
        Ok(())
    } else {
        Err(ParseError::UnexpectedType { expected, found })
    }
}

/// Token from an `S2C_CHALLENGE` body, if `payload` is one.
pub(crate) fn challenge_token(payload: &[u8]) -> Result<Option<[u8; 4]>, ParseError> {
    match payload.split_first() {
        Some((&S2C_CHALLENGE, rest)) => rest
            .get(..4)
            .and_then(|t| <[u8; 4]>::try_from(t).ok())
            .map(Some)
            .ok_or(ParseError::MissingChallenge),
        _ => Ok(None),
    }
}
