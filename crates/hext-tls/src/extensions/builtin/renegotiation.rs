//! renegotiation_info (RFC 5746).

use hext_utils::wire::Reader;
use subtle::ConstantTimeEq;

use super::expect_end;
use crate::extensions::{Emission, HandlerResult, SendResult};
use crate::handshake::context::HandshakeContext;
use crate::{AlertDescription, TlsError};

fn read_verify_data(data: &[u8]) -> Result<&[u8], TlsError> {
    let mut r = Reader::new(data);
    let verify_data = r.read_var(1)?;
    expect_end(&r, "renegotiated_connection")?;
    Ok(verify_data)
}

fn check(received: &[u8], expected: &[u8]) -> Result<(), TlsError> {
    if bool::from(received.ct_eq(expected)) {
        Ok(())
    } else {
        Err(TlsError::fatal(
            AlertDescription::HandshakeFailure,
            "renegotiation_info mismatch",
        ))
    }
}

/// Empty on the initial handshake, the previous client verify_data after.
pub(crate) fn client_send(ctx: &HandshakeContext) -> SendResult<'_> {
    if !ctx.config.allows_pre_tls13() {
        return Ok(None);
    }
    let cvd = ctx.renegotiation.client_verify_data.as_slice();
    Ok(Some(Emission::new(1 + cvd.len(), move |w| w.append_var(cvd, 1))))
}

pub(crate) fn server_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    let received = read_verify_data(data)?;
    check(received, &ctx.renegotiation.client_verify_data)?;
    ctx.renegotiation.secure = true;
    Ok(Some(server_reply))
}

fn server_reply(ctx: &HandshakeContext) -> SendResult<'_> {
    let reneg = &ctx.renegotiation;
    let len = reneg.client_verify_data.len() + reneg.server_verify_data.len();
    Ok(Some(Emission::new(1 + len, move |w| {
        w.append_nested(1, |v| {
            v.append_bytes(&reneg.client_verify_data)?;
            v.append_bytes(&reneg.server_verify_data)
        })
    })))
}

pub(crate) fn client_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    let received = read_verify_data(data)?;
    let reneg = &ctx.renegotiation;
    let expected = [reneg.client_verify_data.as_slice(), reneg.server_verify_data.as_slice()].concat();
    check(received, &expected)?;
    ctx.renegotiation.secure = true;
    Ok(None)
}
