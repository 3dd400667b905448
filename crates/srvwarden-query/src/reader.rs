//! Bounds-checked little-endian reader for query payloads.

use bytes::{Buf, Bytes};

use crate::error::ParseError;

pub(crate) struct Reader {
    buf: Bytes,
}

impl Reader {
    pub(crate) const fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize) -> Result<(), ParseError> {
        if self.buf.remaining() < n {
            Err(ParseError::UnexpectedEnd)
        } else {
            Ok(())
        }
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ParseError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ParseError> {
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub(crate) fn i32(&mut self) -> Result<i32, ParseError> {
        self.need(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub(crate) fn u64(&mut self) -> Result<u64, ParseError> {
        self.need(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub(crate) fn f32(&mut self) -> Result<f32, ParseError> {
        self.need(4)?;
        Ok(self.buf.get_f32_le())
    }

    pub(crate) fn bytes<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        self.need(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Null-terminated string, decoded lossily.
    pub(crate) fn cstring(&mut self) -> Result<String, ParseError> {
        let end = self
            .buf
            .iter()
            .position(|&b| b == 0)
            .ok_or(ParseError::UnexpectedEnd)?;
        let text = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        self.buf.advance(end + 1);
        Ok(text)
    }

    /// Everything not yet consumed.
    pub(crate) fn rest(self) -> Bytes {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_in_order() {
        let mut r = Reader::new(Bytes::from_static(&[
            0x07, 0x34, 0x12, b'h', b'i', 0x00, 0x01, 0x00, 0x00, 0x00,
        ]));
        assert_eq!(r.u8().unwrap(), 7);
        assert_eq!(r.u16().unwrap(), 0x1234);
        assert_eq!(r.cstring().unwrap(), "hi");
        assert_eq!(r.i32().unwrap(), 1);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_underflow_is_error() {
        let mut r = Reader::new(Bytes::from_static(&[0x01, 0x02]));
        assert_eq!(r.i32(), Err(ParseError::UnexpectedEnd));
        assert_eq!(r.u8().unwrap(), 1);
    }

    #[test]
    fn test_unterminated_string() {
        let mut r = Reader::new(Bytes::from_static(b"abc"));
        assert_eq!(r.cstring(), Err(ParseError::UnexpectedEnd));
    }
}
