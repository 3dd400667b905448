//! A2S_RULES response.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::ParseError;
use crate::reader::Reader;
use crate::wire::{S2A_RULES, expect_type};

/// Decode alternating key/value strings.
///
/// The declared count is not trusted: some servers cut the list short, so
/// strings are read until the payload runs out and an unpaired trailing key
/// is dropped.
pub(crate) fn parse(payload: Bytes) -> Result<BTreeMap<String, String>, ParseError> {
    let mut r = Reader::new(payload);
    expect_type(&mut r, S2A_RULES)?;
    let _declared = r.u16()?;

    let mut strings = Vec::new();
    while r.remaining() > 0 {
        match r.cstring() {
            Ok(s) => strings.push(s),
            Err(ParseError::UnexpectedEnd) => break,
            Err(err) => return Err(err),
        }
    }

    if strings.len() < 2 {
        return Err(ParseError::TooFewRules(strings.len()));
    }

    let mut rules = BTreeMap::new();
    let mut iter = strings.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        rules.insert(key, value);
    }
    Ok(rules)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn encode(pairs: &[&str]) -> Vec<u8> {
        let mut p = vec![S2A_RULES];
        p.extend_from_slice(&((pairs.len() / 2) as u16).to_le_bytes());
        for s in pairs {
            p.extend_from_slice(s.as_bytes());
            p.push(0);
        }
        p
    }

    #[test]
    fn test_parse_rules() {
        let rules = parse(Bytes::from(encode(&[
            "ALLOWDOWNLOADCHARS_i",
            "1",
            "CUSTOMSERVERNAME_s",
            "island pve",
        ])))
        .unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules["CUSTOMSERVERNAME_s"], "island pve");
    }

    #[test]
    fn test_unpaired_trailing_key_dropped() {
        let rules = parse(Bytes::from(encode(&["a", "1", "b"]))).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_too_few_strings() {
        assert_eq!(
            parse(Bytes::from(encode(&["lonely"]))),
            Err(ParseError::TooFewRules(1))
        );
        assert_eq!(
            parse(Bytes::from(encode(&[]))),
            Err(ParseError::TooFewRules(0))
        );
    }
}
