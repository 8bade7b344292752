//! Built-in extension handlers and senders.
//!
//! Each module exposes the functions the registry tables point at:
//! `client_send`, `server_handle`, `server_reply` and `client_handle`,
//! as far as the extension needs them.

use hext_utils::wire::Reader;

use super::{Emission, SendResult};
use crate::handshake::context::HandshakeContext;
use crate::{AlertDescription, TlsError};

pub mod groups;
pub mod key_share;
pub mod master_secret;
pub mod padding;
pub mod psk;
pub mod renegotiation;
pub mod server_name;
pub mod session_ticket;
pub mod versions;

pub(crate) fn decode_error(reason: impl Into<String>) -> TlsError {
    TlsError::fatal(AlertDescription::DecodeError, reason)
}

pub(crate) fn illegal_parameter(reason: impl Into<String>) -> TlsError {
    TlsError::fatal(AlertDescription::IllegalParameter, reason)
}

pub(crate) fn expect_empty(data: &[u8], what: &str) -> Result<(), TlsError> {
    if data.is_empty() {
        Ok(())
    } else {
        Err(decode_error(format!("{what} must be empty")))
    }
}

/// Fail unless the reader was consumed exactly.
pub(crate) fn expect_end(r: &Reader<'_>, what: &str) -> Result<(), TlsError> {
    if r.is_empty() {
        Ok(())
    } else {
        Err(decode_error(format!("{} trailing bytes after {what}", r.remaining())))
    }
}

/// A non-empty `len_size`-prefixed vector of u16 values filling `data`.
pub(crate) fn read_u16_list(data: &[u8], len_size: usize, what: &str) -> Result<Vec<u16>, TlsError> {
    let mut r = Reader::new(data);
    let mut list = r.read_nested(len_size)?;
    expect_end(&r, what)?;
    if list.is_empty() || list.remaining() % 2 != 0 {
        return Err(decode_error(format!("bad {what} length {}", list.remaining())));
    }
    let mut out = Vec::with_capacity(list.remaining() / 2);
    while !list.is_empty() {
        out.push(list.read_u16()?);
    }
    Ok(out)
}

/// Reply sender for extensions acknowledged with an empty body.
pub(crate) fn send_empty(_ctx: &HandshakeContext) -> SendResult<'_> {
    Ok(Some(Emission::empty()))
}
