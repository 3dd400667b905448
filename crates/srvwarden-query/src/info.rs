//! A2S_INFO request and response.

use bytes::Bytes;
use srvwarden_core::ServerInfo;

use crate::error::ParseError;
use crate::reader::Reader;
use crate::wire::{A2S_INFO, S2A_INFO, SIMPLE_HEADER, expect_type};

const INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";

/// The Ship carries extra fields after the VAC flag.
const THE_SHIP_APP_ID: u16 = 2400;

const EDF_PORT: u8 = 0x80;
const EDF_STEAM_ID: u8 = 0x10;
const EDF_SOURCE_TV: u8 = 0x40;
const EDF_KEYWORDS: u8 = 0x20;
const EDF_GAME_ID: u8 = 0x01;

/// Keyword prefix carrying the network changelist.
const NET_CL_PREFIX: &str = "NETCL";

pub(crate) fn request(token: Option<[u8; 4]>) -> Vec<u8> {
    let mut out = Vec::with_capacity(29);
    out.extend_from_slice(&SIMPLE_HEADER);
    out.push(A2S_INFO);
    out.extend_from_slice(INFO_PAYLOAD);
    if let Some(token) = token {
        out.extend_from_slice(&token);
    }
    out
}

pub(crate) fn parse(payload: Bytes) -> Result<ServerInfo, ParseError> {
    let mut r = Reader::new(payload);
    expect_type(&mut r, S2A_INFO)?;

    let mut info = ServerInfo {
        protocol: r.u8()?,
        name: r.cstring()?,
        map: r.cstring()?,
        folder: r.cstring()?,
        game: r.cstring()?,
        app_id: r.u16()?,
        players: r.u8()?,
        max_players: r.u8()?,
        bots: r.u8()?,
        server_type: char::from(r.u8()?),
        environment: char::from(r.u8()?),
        private: r.u8()? == 1,
        vac: r.u8()? == 1,
        ..ServerInfo::default()
    };

    if info.app_id == THE_SHIP_APP_ID {
        // mode, witnesses, duration
        r.bytes::<3>()?;
    }
    info.version = r.cstring()?;

    if r.remaining() == 0 {
        return Ok(info);
    }

    let edf = r.u8()?;
    if edf & EDF_PORT != 0 {
        info.port = Some(r.u16()?);
    }
    if edf & EDF_STEAM_ID != 0 {
        info.steam_id = Some(r.u64()?);
    }
    if edf & EDF_SOURCE_TV != 0 {
        let _tv_port = r.u16()?;
        let _tv_name = r.cstring()?;
    }
    if edf & EDF_KEYWORDS != 0 {
        let keywords = r.cstring()?;
        info.net_cl = net_changelist(&keywords);
        info.keywords = Some(keywords);
    }
    if edf & EDF_GAME_ID != 0 {
        info.game_id = Some(r.u64()?);
    }

    Ok(info)
}

/// Digits of the first `NETCL…` token in a comma-separated keyword list.
fn net_changelist(keywords: &str) -> Option<u32> {
    keywords
        .split(',')
        .map(str::trim)
        .find_map(|token| token.strip_prefix(NET_CL_PREFIX))
        .and_then(|rest| {
            let digits: String = rest.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encoded INFO body (after the `FF FF FF FF` header).
    pub(crate) fn sample_payload() -> Vec<u8> {
        let mut p = vec![S2A_INFO, 17];
        for s in ["Island PvE", "TheIsland", "ark_survival_evolved", "ARK: Survival Evolved"] {
            p.extend_from_slice(s.as_bytes());
            p.push(0);
        }
        p.extend_from_slice(&0u16.to_le_bytes());
        p.extend_from_slice(&[12, 70, 0, b'd', b'l', 0, 1]);
        p.extend_from_slice(b"1.0.0.0\0");
        p.push(EDF_PORT | EDF_STEAM_ID | EDF_KEYWORDS | EDF_GAME_ID);
        p.extend_from_slice(&7777u16.to_le_bytes());
        p.extend_from_slice(&90_000_000_000_000_001u64.to_le_bytes());
        p.extend_from_slice(b"SESSIONFLAGS:683,NETCL:321045,OWNINGID:0\0");
        p.extend_from_slice(&346_110u64.to_le_bytes());
        p
    }

    #[test]
    fn test_request_layout() {
        let plain = request(None);
        assert_eq!(&plain[..5], &[0xFF, 0xFF, 0xFF, 0xFF, 0x54]);
        assert_eq!(&plain[5..], b"Source Engine Query\0");

        let challenged = request(Some([1, 2, 3, 4]));
        assert_eq!(&challenged[challenged.len() - 4..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_full_info() {
        let info = parse(Bytes::from(sample_payload())).unwrap();
        assert_eq!(info.protocol, 17);
        assert_eq!(info.name, "Island PvE");
        assert_eq!(info.map, "TheIsland");
        assert_eq!(info.players, 12);
        assert_eq!(info.max_players, 70);
        assert_eq!(info.server_type, 'd');
        assert_eq!(info.environment, 'l');
        assert!(!info.private);
        assert!(info.vac);
        assert_eq!(info.version, "1.0.0.0");
        assert_eq!(info.port, Some(7777));
        assert_eq!(info.steam_id, Some(90_000_000_000_000_001));
        assert_eq!(info.game_id, Some(346_110));
        assert_eq!(info.net_cl, Some(321_045));
    }

    #[test]
    fn test_parse_without_extra_data() {
        let mut payload = sample_payload();
        let end = payload.iter().position(|&b| b == b'1').unwrap() + 8;
        payload.truncate(end);
        let info = parse(Bytes::from(payload)).unwrap();
        assert_eq!(info.version, "1.0.0.0");
        assert_eq!(info.port, None);
        assert_eq!(info.keywords, None);
    }

    #[test]
    fn test_parse_truncated() {
        let mut payload = sample_payload();
        payload.truncate(10);
        assert_eq!(
            parse(Bytes::from(payload)),
            Err(ParseError::UnexpectedEnd)
        );
    }

    #[test]
    fn test_net_changelist() {
        assert_eq!(net_changelist("a,NETCL:123,b"), Some(123));
        assert_eq!(net_changelist("NETCL_77"), Some(77));
        assert_eq!(net_changelist("a,b"), None);
        assert_eq!(net_changelist("NETCL"), None);
    }
}
