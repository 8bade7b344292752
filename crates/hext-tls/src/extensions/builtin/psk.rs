//! pre_shared_key and psk_key_exchange_modes (RFC 8446 sections 4.2.9
//! and 4.2.11), carrying session tickets for TLS 1.3 resumption.
//!
//! Binders are written as zero placeholders of the configured length; the
//! handshake layer fills them in once the transcript is known.

use hext_utils::wire::Reader;

use super::{decode_error, expect_end, illegal_parameter};
use crate::extensions::{Emission, ExtensionType, HandlerResult, SendResult};
use crate::handshake::context::HandshakeContext;
use crate::session::process_ticket;
use crate::{AlertDescription, TlsError};

/// psk_dhe_ke: PSK with (EC)DHE key establishment.
pub const PSK_DHE_KE: u8 = 1;

const MIN_BINDER_LEN: usize = 32;

pub(crate) fn modes_client_send(ctx: &HandshakeContext) -> SendResult<'_> {
    let config = &ctx.config;
    if !config.allows_tls13() || !config.session_tickets {
        return Ok(None);
    }
    Ok(Some(Emission::new(2, |w| w.append_var(&[PSK_DHE_KE], 1))))
}

pub(crate) fn modes_server_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    let mut r = Reader::new(data);
    let modes = r.read_var(1)?;
    expect_end(&r, "psk_key_exchange_modes")?;
    if modes.is_empty() {
        return Err(decode_error("empty psk_key_exchange_modes"));
    }
    ctx.peer.psk_key_exchange_modes = modes.to_vec();
    Ok(None)
}

/// `obfuscated_ticket_age` for a ticket received at `received_at`.
pub fn obfuscated_age(now: u32, received_at: u32, age_add: u32) -> u32 {
    now.saturating_sub(received_at)
        .wrapping_mul(1000)
        .wrapping_add(age_add)
}

/// Offers the stored ticket as the only identity.
pub(crate) fn client_send(ctx: &HandshakeContext) -> SendResult<'_> {
    let config = &ctx.config;
    let Some(ticket) = config.resumption_ticket.as_ref() else {
        return Ok(None);
    };
    if !config.allows_tls13() || !config.session_tickets || ticket.ticket.is_empty() {
        return Ok(None);
    }
    let binder_len = config.psk_binder_len;
    if !(MIN_BINDER_LEN..=255).contains(&binder_len) {
        return Err(TlsError::Internal(format!("PSK binder length {binder_len}")));
    }
    let identity = ticket.ticket.as_slice();
    if identity.len() > 0xFFFF - 8 {
        return Err(TlsError::Internal(format!("ticket of {} bytes", identity.len())));
    }
    let age = obfuscated_age(ctx.now(), ticket.received_at, ticket.age_add);
    let len = 2 + (2 + identity.len() + 4) + 2 + (1 + binder_len);
    Ok(Some(Emission::new(len, move |w| {
        w.append_nested(2, |ids| {
            ids.append_var(identity, 2)?;
            ids.append_u32(age)
        })?;
        w.append_nested(2, |binders| binders.append_var(&vec![0u8; binder_len], 1))
    })))
}

/// Server: resume from the first identity if its ticket is still good.
///
/// Requires psk_key_exchange_modes earlier in the same ClientHello.
pub(crate) fn server_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    if !ctx.negotiation.is_negotiated(ExtensionType::PskKeyExchangeModes) {
        return Err(TlsError::fatal(
            AlertDescription::MissingExtension,
            "pre_shared_key without psk_key_exchange_modes",
        ));
    }
    let mut r = Reader::new(data);
    let mut ids = r.read_nested(2)?;
    let mut binders = r.read_nested(2)?;
    expect_end(&r, "pre_shared_key")?;

    let mut identities = Vec::new();
    while !ids.is_empty() {
        let identity = ids.read_var(2)?;
        let _age = ids.read_u32()?;
        if identity.is_empty() {
            return Err(decode_error("empty PSK identity"));
        }
        identities.push(identity);
    }
    let mut binder_count = 0usize;
    while !binders.is_empty() {
        let binder = binders.read_var(1)?;
        if binder.len() < MIN_BINDER_LEN {
            return Err(decode_error(format!("PSK binder of {} bytes", binder.len())));
        }
        binder_count += 1;
    }
    if identities.is_empty() || identities.len() != binder_count {
        return Err(decode_error(format!(
            "{} PSK identities but {binder_count} binders",
            identities.len()
        )));
    }

    if !ctx.peer.psk_key_exchange_modes.contains(&PSK_DHE_KE) {
        tracing::debug!("no supported PSK key exchange mode");
        return Ok(None);
    }
    let config = std::sync::Arc::clone(&ctx.config);
    let Some(keys) = config.ticket_keys.as_deref().filter(|_| config.session_tickets) else {
        return Ok(None);
    };
    let resumed = process_ticket(keys, identities[0], config.ticket_lifetime_hint, ctx.now())
        .filter(|s| s.version.is_tls13());
    let Some(resumed) = resumed else {
        return Ok(None);
    };
    ctx.resumption.resumed = Some(resumed);
    ctx.resumption.psk_selected = Some(0);
    Ok(Some(server_reply))
}

fn server_reply(ctx: &HandshakeContext) -> SendResult<'_> {
    let Some(index) = ctx.resumption.psk_selected else {
        return Ok(None);
    };
    Ok(Some(Emission::new(2, move |w| w.append_u16(index))))
}

/// The selected identity must be one we offered.
pub(crate) fn client_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    let [hi, lo] = data else {
        return Err(decode_error(format!("pre_shared_key of {} bytes", data.len())));
    };
    let index = u16::from_be_bytes([*hi, *lo]);
    let offered = u16::from(ctx.resumption.psk_offered);
    if index >= offered {
        return Err(illegal_parameter(format!("server selected PSK identity {index}")));
    }
    ctx.resumption.psk_selected = Some(index);
    Ok(None)
}
