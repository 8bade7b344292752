//! extended_master_secret (RFC 7627).

use super::{expect_empty, send_empty};
use crate::extensions::{Emission, HandlerResult, SendResult};
use crate::handshake::context::HandshakeContext;

pub(crate) fn client_send(ctx: &HandshakeContext) -> SendResult<'_> {
    let config = &ctx.config;
    if !config.enable_extended_master_secret || !config.allows_pre_tls13() {
        return Ok(None);
    }
    Ok(Some(Emission::empty()))
}

pub(crate) fn server_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    expect_empty(data, "extended_master_secret")?;
    if !ctx.config.enable_extended_master_secret {
        return Ok(None);
    }
    ctx.extended_master_secret = true;
    Ok(Some(send_empty))
}

pub(crate) fn client_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    expect_empty(data, "extended_master_secret")?;
    ctx.extended_master_secret = true;
    Ok(None)
}
