//! Big-endian wire primitives over byte slices.
//!
//! [`Reader`] is a cursor that fails closed on underrun. [`Writer`] appends to
//! a caller-owned buffer under a fixed byte budget.

use hext_types::WireError;

/// A cursor over received bytes.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a new reader over the given data.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The unread bytes, without consuming them.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Consume exactly `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if n > self.remaining() {
            return Err(WireError::Truncated {
                need: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Consume a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u24(&mut self) -> Result<u32, WireError> {
        let b = self.read_bytes(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian unsigned integer of `width` bytes (1..=4).
    pub fn read_uint(&mut self, width: usize) -> Result<u32, WireError> {
        match width {
            1 => self.read_u8().map(u32::from),
            2 => self.read_u16().map(u32::from),
            3 => self.read_u24(),
            4 => self.read_u32(),
            w => Err(WireError::BadLengthWidth(w)),
        }
    }

    /// Read a variable-length field prefixed by a `len_size`-byte length.
    pub fn read_var(&mut self, len_size: usize) -> Result<&'a [u8], WireError> {
        let len = self.read_uint(len_size)? as usize;
        self.read_bytes(len)
    }

    /// Like [`read_var`](Self::read_var) but returns a sub-reader over the field.
    pub fn read_nested(&mut self, len_size: usize) -> Result<Reader<'a>, WireError> {
        self.read_var(len_size).map(Reader::new)
    }
}

/// Largest value representable in a `width`-byte length prefix.
fn max_for_width(width: usize) -> Result<usize, WireError> {
    match width {
        1 => Ok(0xFF),
        2 => Ok(0xFFFF),
        3 => Ok(0xFF_FFFF),
        4 => Ok(0xFFFF_FFFF),
        w => Err(WireError::BadLengthWidth(w)),
    }
}

/// Appends big-endian fields to a buffer, never growing it past `max_bytes`
/// beyond where the writer started.
#[derive(Debug)]
pub struct Writer<'b> {
    buf: &'b mut Vec<u8>,
    start: usize,
    max_bytes: usize,
}

impl<'b> Writer<'b> {
    /// A writer that may append at most `max_bytes` to `buf`.
    pub fn with_budget(buf: &'b mut Vec<u8>, max_bytes: usize) -> Self {
        let start = buf.len();
        Self {
            buf,
            start,
            max_bytes,
        }
    }

    /// A writer limited only by `usize`.
    pub fn unbounded(buf: &'b mut Vec<u8>) -> Self {
        Self::with_budget(buf, usize::MAX)
    }

    /// Bytes appended by this writer so far.
    pub fn written(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Budget left.
    pub fn available(&self) -> usize {
        self.max_bytes - self.written()
    }

    fn reserve(&mut self, n: usize) -> Result<(), WireError> {
        if n > self.available() {
            return Err(WireError::BufferFull {
                need: n,
                available: self.available(),
            });
        }
        Ok(())
    }

    pub fn append_bytes(&mut self, data: &[u8]) -> Result<(), WireError> {
        self.reserve(data.len())?;
        self.buf.extend_from_slice(data);
        Ok(())
    }

    pub fn append_u8(&mut self, v: u8) -> Result<(), WireError> {
        self.append_bytes(&[v])
    }

    pub fn append_u16(&mut self, v: u16) -> Result<(), WireError> {
        self.append_bytes(&v.to_be_bytes())
    }

    pub fn append_u24(&mut self, v: u32) -> Result<(), WireError> {
        if v > 0xFF_FFFF {
            return Err(WireError::LengthOverflow {
                len: v as usize,
                max: 0xFF_FFFF,
            });
        }
        self.append_bytes(&v.to_be_bytes()[1..])
    }

    pub fn append_u32(&mut self, v: u32) -> Result<(), WireError> {
        self.append_bytes(&v.to_be_bytes())
    }

    /// Append a `width`-byte big-endian unsigned integer.
    pub fn append_uint(&mut self, v: usize, width: usize) -> Result<(), WireError> {
        let max = max_for_width(width)?;
        if v > max {
            return Err(WireError::LengthOverflow { len: v, max });
        }
        let bytes = (v as u64).to_be_bytes();
        self.append_bytes(&bytes[8 - width..])
    }

    /// Append `data` prefixed by its length in `len_size` bytes.
    pub fn append_var(&mut self, data: &[u8], len_size: usize) -> Result<(), WireError> {
        let max = max_for_width(len_size)?;
        if data.len() > max {
            return Err(WireError::LengthOverflow {
                len: data.len(),
                max,
            });
        }
        self.reserve(len_size + data.len())?;
        self.append_uint(data.len(), len_size)?;
        self.append_bytes(data)
    }

    /// Append a length-prefixed field whose body is produced by `f`.
    ///
    /// The prefix is patched once `f` returns; on error nothing from this
    /// call is left in the buffer.
    pub fn append_nested<F>(&mut self, len_size: usize, f: F) -> Result<(), WireError>
    where
        F: FnOnce(&mut Writer<'_>) -> Result<(), WireError>,
    {
        let max = max_for_width(len_size)?;
        let mark = self.buf.len();
        self.append_uint(0, len_size)?;
        let budget = self.available();
        let body_len = {
            let mut inner = Writer::with_budget(self.buf, budget);
            let res = f(&mut inner);
            let n = inner.written();
            if let Err(e) = res {
                self.buf.truncate(mark);
                return Err(e);
            }
            n
        };
        if body_len > max {
            self.buf.truncate(mark);
            return Err(WireError::LengthOverflow { len: body_len, max });
        }
        let prefix = (body_len as u64).to_be_bytes();
        self.buf[mark..mark + len_size].copy_from_slice(&prefix[8 - len_size..]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integers() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_u16().unwrap(), 0x0203);
        assert_eq!(r.read_u24().unwrap(), 0x040506);
        assert_eq!(r.read_u32().unwrap(), 0x0708090a);
        assert!(r.is_empty());
    }

    #[test]
    fn test_read_truncated_does_not_advance() {
        let data = [0x01];
        let mut r = Reader::new(&data);
        assert_eq!(
            r.read_u16(),
            Err(WireError::Truncated {
                need: 2,
                remaining: 1
            })
        );
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_u8().unwrap(), 0x01);
    }

    #[test]
    fn test_read_var() {
        let data = [0x00, 0x03, b'a', b'b', b'c', 0x01, b'z'];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_var(2).unwrap(), b"abc");
        assert_eq!(r.read_var(1).unwrap(), b"z");
        assert!(r.is_empty());
    }

    #[test]
    fn test_read_var_overlong_length() {
        let data = [0x05, 0xaa, 0xbb];
        let mut r = Reader::new(&data);
        assert!(matches!(
            r.read_var(1),
            Err(WireError::Truncated { need: 5, .. })
        ));
    }

    #[test]
    fn test_read_bad_width() {
        let mut r = Reader::new(&[0u8; 8]);
        assert_eq!(r.read_var(5), Err(WireError::BadLengthWidth(5)));
    }

    #[test]
    fn test_writer_budget() {
        let mut buf = Vec::new();
        let mut w = Writer::with_budget(&mut buf, 3);
        w.append_u16(0xABCD).unwrap();
        assert_eq!(
            w.append_u16(0x0102),
            Err(WireError::BufferFull {
                need: 2,
                available: 1
            })
        );
        w.append_u8(0xEF).unwrap();
        assert_eq!(w.available(), 0);
        assert_eq!(buf, vec![0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn test_writer_budget_relative_to_start() {
        let mut buf = vec![0xFF; 10];
        let mut w = Writer::with_budget(&mut buf, 2);
        w.append_u16(1).unwrap();
        assert!(w.append_u8(0).is_err());
        assert_eq!(buf.len(), 12);
    }

    #[test]
    fn test_append_var_and_u24() {
        let mut buf = Vec::new();
        let mut w = Writer::unbounded(&mut buf);
        w.append_var(b"hi", 1).unwrap();
        w.append_var(b"xyz", 3).unwrap();
        w.append_u24(0x010203).unwrap();
        assert_eq!(
            buf,
            vec![0x02, b'h', b'i', 0x00, 0x00, 0x03, b'x', b'y', b'z', 0x01, 0x02, 0x03]
        );
    }

    #[test]
    fn test_append_var_overflow() {
        let mut buf = Vec::new();
        let mut w = Writer::unbounded(&mut buf);
        let big = vec![0u8; 256];
        assert_eq!(
            w.append_var(&big, 1),
            Err(WireError::LengthOverflow { len: 256, max: 255 })
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_append_nested_patches_length() {
        let mut buf = Vec::new();
        let mut w = Writer::unbounded(&mut buf);
        w.append_nested(2, |inner| {
            inner.append_u8(0x01)?;
            inner.append_var(b"ab", 1)
        })
        .unwrap();
        assert_eq!(buf, vec![0x00, 0x04, 0x01, 0x02, b'a', b'b']);
    }

    #[test]
    fn test_append_nested_rolls_back_on_error() {
        let mut buf = vec![0x55];
        let mut w = Writer::with_budget(&mut buf, 4);
        let res = w.append_nested(2, |inner| inner.append_u32(0));
        assert!(res.is_err());
        assert_eq!(w.written(), 0);
        assert_eq!(buf, vec![0x55]);
    }

    #[test]
    fn test_reader_writer_roundtrip_nested() {
        let mut buf = Vec::new();
        let mut w = Writer::unbounded(&mut buf);
        w.append_nested(2, |inner| {
            inner.append_u16(0x001d)?;
            inner.append_var(&[7u8; 32], 2)
        })
        .unwrap();

        let mut r = Reader::new(&buf);
        let mut list = r.read_nested(2).unwrap();
        assert_eq!(list.read_u16().unwrap(), 0x001d);
        assert_eq!(list.read_var(2).unwrap(), &[7u8; 32]);
        assert!(list.is_empty());
        assert!(r.is_empty());
    }
}
