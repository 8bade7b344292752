//! Two-pass extension emission under a byte budget.
//!
//! Pass one asks every sender for an [`Emission`]: the exact body length
//! plus a closure that writes it. Pass two runs the closures in order and
//! checks each wrote what it declared.

use std::fmt;

use hext_types::WireError;
use hext_utils::wire::Writer;

use super::{ExtensionType, SenderFn};
use crate::handshake::context::HandshakeContext;
use crate::TlsError;

type WriteFn<'c> = Box<dyn FnOnce(&mut Writer<'_>) -> Result<(), WireError> + 'c>;

/// A planned extension body: its length and the code that writes it.
pub struct Emission<'c> {
    len: usize,
    write: WriteFn<'c>,
}

impl<'c> Emission<'c> {
    pub fn new<F>(len: usize, write: F) -> Self
    where
        F: FnOnce(&mut Writer<'_>) -> Result<(), WireError> + 'c,
    {
        Self {
            len,
            write: Box::new(write),
        }
    }

    /// An extension with an empty body.
    pub fn empty() -> Self {
        Self::new(0, |_| Ok(()))
    }

    /// A body that is already serialized.
    pub fn bytes(data: Vec<u8>) -> Self {
        Self::new(data.len(), move |w| w.append_bytes(&data))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for Emission<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emission").field("len", &self.len).finish_non_exhaustive()
    }
}

/// Size of the padding body that moves a ClientHello body of `hello_len`
/// bytes (handshake header excluded) out of [256, 512) once the 4-byte
/// handshake header is added.
///
/// Returns `None` when no padding is needed. The extension header is
/// accounted for, so the returned body may be empty.
pub fn padding_body_len(hello_len: usize) -> Option<usize> {
    let record_len = hello_len + 4;
    if !(256..512).contains(&record_len) {
        return None;
    }
    let ext_len = 512 - record_len;
    Some(ext_len.max(4 + 1) - 4)
}

/// The ordered set of extensions to emit for one message.
#[derive(Default)]
pub struct ExtensionEmitter<'c> {
    planned: Vec<(ExtensionType, Emission<'c>)>,
}

impl<'c> ExtensionEmitter<'c> {
    pub fn new() -> Self {
        Self {
            planned: Vec::new(),
        }
    }

    /// Pass one: ask each sender for its emission, skipping those that do
    /// not apply.
    pub fn plan<I>(ctx: &'c HandshakeContext, senders: I) -> Result<Self, TlsError>
    where
        I: IntoIterator<Item = (ExtensionType, SenderFn)>,
    {
        let mut emitter = Self::new();
        for (ty, sender) in senders {
            if let Some(emission) = sender(ctx)? {
                emitter.push(ty, emission);
            }
        }
        Ok(emitter)
    }

    /// Append an extension, keeping a planned pre_shared_key last.
    pub fn push(&mut self, ty: ExtensionType, emission: Emission<'c>) {
        let at = match self.planned.last() {
            Some((ExtensionType::PreSharedKey, _)) => self.planned.len() - 1,
            _ => self.planned.len(),
        };
        self.planned.insert(at, (ty, emission));
    }

    pub fn types(&self) -> impl Iterator<Item = ExtensionType> + '_ {
        self.planned.iter().map(|(t, _)| *t)
    }

    pub fn is_empty(&self) -> bool {
        self.planned.is_empty()
    }

    /// Bytes the block will occupy, TLV headers included.
    pub fn total_len(&self) -> usize {
        self.planned.iter().map(|(_, e)| 4 + e.len).sum()
    }

    /// Add a padding extension sized for a ClientHello whose body bytes
    /// before the extension block, its length field included, number
    /// `hello_prefix_len`. The 4-byte handshake header is not counted.
    ///
    /// Padding goes before a trailing pre_shared_key so that one stays last.
    pub fn insert_padding(&mut self, hello_prefix_len: usize) -> Option<usize> {
        let body = padding_body_len(hello_prefix_len + self.total_len())?;
        let emission = Emission::new(body, move |w| w.append_bytes(&vec![0u8; body]));
        self.push(ExtensionType::Padding, emission);
        Some(body)
    }

    /// Pass two: serialize into `out`, never appending more than
    /// `max_bytes`.
    ///
    /// The budget is checked against the planned total before anything is
    /// written. On error `out` is left as it was. Returns the types written,
    /// in order.
    pub fn write(self, out: &mut Vec<u8>, max_bytes: usize) -> Result<Vec<ExtensionType>, TlsError> {
        let need = self.total_len();
        if need > max_bytes {
            return Err(TlsError::BudgetExceeded {
                need,
                max: max_bytes,
            });
        }
        let mark = out.len();
        let res = Self::write_all(self.planned, out);
        if res.is_err() {
            out.truncate(mark);
        }
        res
    }

    fn write_all(
        planned: Vec<(ExtensionType, Emission<'c>)>,
        out: &mut Vec<u8>,
    ) -> Result<Vec<ExtensionType>, TlsError> {
        let mut written = Vec::with_capacity(planned.len());
        for (ty, emission) in planned {
            let len = emission.len;
            if len > 0xFFFF {
                return Err(TlsError::Internal(format!("{ty} body of {len} bytes")));
            }
            let mut w = Writer::with_budget(out, 4 + len);
            w.append_u16(ty.code())?;
            w.append_u16(len as u16)?;
            let res = (emission.write)(&mut w);
            let body = w.written() - 4;
            match res {
                Ok(()) if body == len => {}
                Ok(()) | Err(WireError::BufferFull { .. }) => {
                    return Err(TlsError::Internal(format!(
                        "{ty} sender declared {len} bytes but wrote {body}"
                    )));
                }
                Err(e) => return Err(e.into()),
            }
            tracing::trace!(ext = %ty, len, "extension written");
            written.push(ty);
        }
        Ok(written)
    }
}

impl fmt::Debug for ExtensionEmitter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.planned.iter().map(|(t, e)| (t, e.len))).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_body_len_rule() {
        assert_eq!(padding_body_len(200), None);
        assert_eq!(padding_body_len(252), Some(256 - 4));
        assert_eq!(padding_body_len(300), Some(512 - 304 - 4));
        // close to the top the extension still needs a 1-byte body
        assert_eq!(padding_body_len(506), Some(1));
        assert_eq!(padding_body_len(507), Some(1));
        assert_eq!(padding_body_len(508), None);
    }

    #[test]
    fn test_padding_clears_window_with_handshake_header() {
        for hello_len in 0..600 {
            let message = match padding_body_len(hello_len) {
                Some(body) => hello_len + 4 + 4 + body,
                None => hello_len + 4,
            };
            assert!(!(256..512).contains(&message), "hello_len {hello_len} -> {message}");
        }
    }

    #[test]
    fn test_write_emits_tlvs_in_order() {
        let mut e = ExtensionEmitter::new();
        e.push(ExtensionType::ExtendedMasterSecret, Emission::empty());
        e.push(ExtensionType::Alpn, Emission::bytes(vec![0, 3, 2, b'h', b'2']));
        assert_eq!(e.total_len(), 4 + 9);
        let mut out = Vec::new();
        let types = e.write(&mut out, 100).unwrap();
        assert_eq!(types, vec![ExtensionType::ExtendedMasterSecret, ExtensionType::Alpn]);
        assert_eq!(
            out,
            vec![0, 23, 0, 0, 0, 16, 0, 5, 0, 3, 2, b'h', b'2']
        );
    }

    #[test]
    fn test_budget_checked_before_writing() {
        let mut e = ExtensionEmitter::new();
        e.push(ExtensionType::Alpn, Emission::bytes(vec![1; 10]));
        let mut out = vec![0xAA];
        let err = e.write(&mut out, 13).unwrap_err();
        assert!(matches!(err, TlsError::BudgetExceeded { need: 14, max: 13 }));
        assert!(err.alert().is_none());
        assert_eq!(out, vec![0xAA]);
    }

    #[test]
    fn test_short_write_is_internal_error() {
        let mut e = ExtensionEmitter::new();
        e.push(ExtensionType::ServerName, Emission::empty());
        e.push(ExtensionType::Alpn, Emission::new(4, |w| w.append_u16(7)));
        let mut out = Vec::new();
        assert!(matches!(e.write(&mut out, 100), Err(TlsError::Internal(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_long_write_is_internal_error() {
        let mut e = ExtensionEmitter::new();
        e.push(ExtensionType::Alpn, Emission::new(1, |w| w.append_u16(7)));
        let mut out = Vec::new();
        assert!(matches!(e.write(&mut out, 100), Err(TlsError::Internal(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_padding_inserted_before_psk() {
        let mut e = ExtensionEmitter::new();
        e.push(ExtensionType::ServerName, Emission::bytes(vec![0; 20]));
        e.push(ExtensionType::PreSharedKey, Emission::bytes(vec![0; 60]));
        let body = e.insert_padding(200).unwrap();
        let types: Vec<_> = e.types().collect();
        assert_eq!(
            types,
            vec![ExtensionType::ServerName, ExtensionType::Padding, ExtensionType::PreSharedKey]
        );
        // 200 + 24 + 64 = 288 -> record 292, pad extension 220 bytes
        assert_eq!(body, 216);
        assert_eq!(200 + e.total_len() + 4, 512);
    }

    #[test]
    fn test_no_padding_for_small_hello() {
        let mut e = ExtensionEmitter::new();
        e.push(ExtensionType::ServerName, Emission::bytes(vec![0; 20]));
        assert_eq!(e.insert_padding(40), None);
        assert_eq!(e.types().count(), 1);
    }
}
