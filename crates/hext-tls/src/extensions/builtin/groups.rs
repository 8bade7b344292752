//! supported_groups, ec_point_formats and signature_algorithms.

use hext_utils::wire::Reader;

use super::{decode_error, expect_end, illegal_parameter, read_u16_list};
use crate::crypt::{NamedGroup, SignatureScheme};
use crate::extensions::{Emission, HandlerResult, SendResult};
use crate::handshake::context::HandshakeContext;

const POINT_FORMAT_UNCOMPRESSED: u8 = 0;

pub(crate) fn supported_groups_send(ctx: &HandshakeContext) -> SendResult<'_> {
    let groups = &ctx.config.supported_groups;
    if groups.is_empty() {
        return Ok(None);
    }
    Ok(Some(Emission::new(2 + 2 * groups.len(), move |w| {
        w.append_nested(2, |l| groups.iter().try_for_each(|g| l.append_u16(g.0)))
    })))
}

pub(crate) fn supported_groups_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    let groups = read_u16_list(data, 2, "supported_groups")?;
    ctx.peer.supported_groups = groups.into_iter().map(NamedGroup).collect();
    Ok(None)
}

/// Sent only when a pre-1.3 version is possible and an ECC group is configured.
pub(crate) fn point_formats_send(ctx: &HandshakeContext) -> SendResult<'_> {
    let config = &ctx.config;
    if !config.allows_pre_tls13() || !config.supported_groups.iter().any(NamedGroup::is_ecc) {
        return Ok(None);
    }
    Ok(Some(uncompressed_only()))
}

fn uncompressed_only<'c>() -> Emission<'c> {
    Emission::new(2, |w| w.append_var(&[POINT_FORMAT_UNCOMPRESSED], 1))
}

fn parse_point_formats(data: &[u8]) -> Result<Vec<u8>, crate::TlsError> {
    let mut r = Reader::new(data);
    let formats = r.read_var(1)?;
    expect_end(&r, "ec_point_formats")?;
    if formats.is_empty() {
        return Err(decode_error("empty ec_point_formats"));
    }
    if !formats.contains(&POINT_FORMAT_UNCOMPRESSED) {
        return Err(illegal_parameter("peer does not support uncompressed points"));
    }
    Ok(formats.to_vec())
}

pub(crate) fn point_formats_server_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    ctx.peer.ec_point_formats = parse_point_formats(data)?;
    Ok(Some(point_formats_reply))
}

fn point_formats_reply(_ctx: &HandshakeContext) -> SendResult<'_> {
    Ok(Some(uncompressed_only()))
}

pub(crate) fn point_formats_client_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    ctx.peer.ec_point_formats = parse_point_formats(data)?;
    Ok(None)
}

pub(crate) fn signature_algorithms_send(ctx: &HandshakeContext) -> SendResult<'_> {
    let schemes = &ctx.config.signature_algorithms;
    if schemes.is_empty() {
        return Ok(None);
    }
    Ok(Some(Emission::new(2 + 2 * schemes.len(), move |w| {
        w.append_nested(2, |l| schemes.iter().try_for_each(|s| l.append_u16(s.0)))
    })))
}

pub(crate) fn signature_algorithms_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    let schemes = read_u16_list(data, 2, "signature_algorithms")?;
    ctx.peer.signature_algorithms = schemes.into_iter().map(SignatureScheme).collect();
    Ok(None)
}
