//! key_share (RFC 8446 section 4.2.8).

use hext_types::CryptoError;
use hext_utils::wire::Reader;

use super::{decode_error, expect_end, illegal_parameter};
use crate::crypt::NamedGroup;
use crate::extensions::{Emission, HandlerResult, SendResult};
use crate::handshake::context::HandshakeContext;
use crate::handshake::KeyExchange;
use crate::TlsError;

/// One `KeyShareEntry` as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    pub group: NamedGroup,
    pub key_exchange: Vec<u8>,
}

impl KeyShareEntry {
    fn read(r: &mut Reader<'_>) -> Result<Self, TlsError> {
        let group = NamedGroup(r.read_u16()?);
        let key_exchange = r.read_var(2)?;
        if key_exchange.is_empty() {
            return Err(decode_error("empty key_exchange"));
        }
        Ok(Self {
            group,
            key_exchange: key_exchange.to_vec(),
        })
    }
}

fn peer_key_error(e: CryptoError) -> TlsError {
    match e {
        CryptoError::InvalidPublicKey => illegal_parameter("invalid key share"),
        other => other.into(),
    }
}

/// Offers a single share for the configured group.
pub(crate) fn client_send(ctx: &HandshakeContext) -> SendResult<'_> {
    if !ctx.config.allows_tls13() {
        return Ok(None);
    }
    let group = ctx.config.key_share_group;
    let public = ctx.ephemeral_key(group)?.public_key_bytes();
    Ok(Some(Emission::new(2 + 4 + public.len(), move |w| {
        w.append_nested(2, |l| {
            l.append_u16(group.0)?;
            l.append_var(public, 2)
        })
    })))
}

/// Picks the first offered share whose group we support and completes the
/// exchange. With no usable share, records the group a HelloRetryRequest
/// should ask for and sends nothing.
pub(crate) fn server_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    let mut r = Reader::new(data);
    let mut list = r.read_nested(2)?;
    expect_end(&r, "client_shares")?;
    let mut entries: Vec<KeyShareEntry> = Vec::new();
    while !list.is_empty() {
        let entry = KeyShareEntry::read(&mut list)?;
        if entries.iter().any(|e| e.group == entry.group) {
            return Err(illegal_parameter(format!("duplicate key share for 0x{:04x}", entry.group.0)));
        }
        entries.push(entry);
    }

    let usable = |g: NamedGroup| ctx.config.supported_groups.contains(&g) && KeyExchange::supports(g);
    let chosen = entries.iter().find(|e| usable(e.group)).cloned();
    let retry = if chosen.is_none() {
        ctx.config
            .supported_groups
            .iter()
            .copied()
            .filter(|g| KeyExchange::supports(*g))
            .find(|g| ctx.peer.supported_groups.is_empty() || ctx.peer.supported_groups.contains(g))
    } else {
        None
    };
    ctx.key_share.peer_entries = entries;

    let Some(entry) = chosen else {
        tracing::debug!(retry_group = ?retry, "no usable key share");
        ctx.key_share.retry_group = retry;
        return Ok(None);
    };
    let secret = ctx
        .ephemeral_key(entry.group)?
        .compute_shared_secret(&entry.key_exchange)
        .map_err(peer_key_error)?;
    ctx.key_share.selected = Some(entry.group);
    ctx.key_share.shared_secret = Some(secret);
    tracing::debug!(group = entry.group.0, "key share selected");
    Ok(Some(server_reply))
}

fn server_reply(ctx: &HandshakeContext) -> SendResult<'_> {
    let Some(group) = ctx.key_share.selected else {
        return Ok(None);
    };
    let public = ctx.ephemeral_key(group)?.public_key_bytes();
    Ok(Some(Emission::new(4 + public.len(), move |w| {
        w.append_u16(group.0)?;
        w.append_var(public, 2)
    })))
}

/// The server must answer in the group we offered.
pub(crate) fn client_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    let mut r = Reader::new(data);
    let entry = KeyShareEntry::read(&mut r)?;
    expect_end(&r, "server key share")?;
    let offered = ctx.key_share.ephemeral.get().map(KeyExchange::group);
    if offered != Some(entry.group) {
        return Err(illegal_parameter(format!(
            "server key share for unoffered group 0x{:04x}",
            entry.group.0
        )));
    }
    let secret = ctx
        .ephemeral_key(entry.group)?
        .compute_shared_secret(&entry.key_exchange)
        .map_err(peer_key_error)?;
    ctx.key_share.selected = Some(entry.group);
    ctx.key_share.shared_secret = Some(secret);
    Ok(None)
}
