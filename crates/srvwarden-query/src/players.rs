//! A2S_PLAYER response.

use bytes::Bytes;
use srvwarden_core::{QueryPlayer, format_clock};

use crate::error::ParseError;
use crate::reader::Reader;
use crate::wire::{S2A_PLAYER, expect_type};

pub(crate) fn parse(payload: Bytes) -> Result<Vec<QueryPlayer>, ParseError> {
    let mut r = Reader::new(payload);
    expect_type(&mut r, S2A_PLAYER)?;

    let count = r.u8()?;
    let mut players = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let _index = r.u8()?;
        let name = r.cstring()?;
        let score = r.i32()?;
        let duration = r.f32()?;
        players.push(QueryPlayer {
            name,
            score,
            duration: format_clock(duration),
        });
    }
    Ok(players)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_payload() -> Vec<u8> {
        let mut p = vec![S2A_PLAYER, 2];
        for (name, score, secs) in [("Alice", 10i32, 3_725.5f32), ("", 0, 12.0)] {
            p.push(0);
            p.extend_from_slice(name.as_bytes());
            p.push(0);
            p.extend_from_slice(&score.to_le_bytes());
            p.extend_from_slice(&secs.to_le_bytes());
        }
        p
    }

    #[test]
    fn test_parse_players() {
        let players = parse(Bytes::from(sample_payload())).unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].name, "Alice");
        assert_eq!(players[0].score, 10);
        assert_eq!(players[0].duration, "01:02:05");
        assert_eq!(players[1].name, "");
        assert_eq!(players[1].duration, "00:00:12");
    }

    #[test]
    fn test_count_beyond_payload() {
        let mut payload = sample_payload();
        payload[1] = 3;
        assert_eq!(
            parse(Bytes::from(payload)),
            Err(ParseError::UnexpectedEnd)
        );
    }

    #[test]
    fn test_wrong_type() {
        assert_eq!(
            parse(Bytes::from_static(&[0x45, 0])),
            Err(ParseError::UnexpectedType {
                expected: S2A_PLAYER,
                found: 0x45
            })
        );
    }
}
