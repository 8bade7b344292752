//! session_ticket (RFC 5077) for TLS 1.2 and older.

use super::{expect_empty, send_empty};
use crate::extensions::{Emission, HandlerResult, SendResult};
use crate::handshake::context::HandshakeContext;
use crate::session::process_ticket;

/// Carries a stored ticket, or an empty body to ask for a new one.
pub(crate) fn client_send(ctx: &HandshakeContext) -> SendResult<'_> {
    let config = &ctx.config;
    if !config.session_tickets || !config.allows_pre_tls13() {
        return Ok(None);
    }
    match &config.resumption_ticket {
        Some(t) => {
            let ticket = t.ticket.as_slice();
            Ok(Some(Emission::new(ticket.len(), move |w| w.append_bytes(ticket))))
        }
        None => Ok(Some(Emission::empty())),
    }
}

/// Tries to resume from a presented ticket. A session from another
/// protocol version is not resumed. Any failure falls back to a full
/// handshake; the empty reply promises a NewSessionTicket either way.
pub(crate) fn server_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    let config = std::sync::Arc::clone(&ctx.config);
    let Some(keys) = config.ticket_keys.as_deref().filter(|_| config.session_tickets) else {
        return Ok(None);
    };
    if !data.is_empty() {
        let version = ctx.version();
        ctx.resumption.resumed = process_ticket(keys, data, config.ticket_lifetime_hint, ctx.now())
            .filter(|s| s.version == version);
    }
    Ok(Some(send_empty))
}

pub(crate) fn client_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    expect_empty(data, "session_ticket from server")?;
    ctx.resumption.expect_new_session_ticket = true;
    Ok(None)
}
