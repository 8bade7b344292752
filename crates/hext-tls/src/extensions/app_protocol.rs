//! Application protocol negotiation: ALPN (RFC 7301) and NPN.
//!
//! The two are mutually exclusive per handshake. ALPN requires the chosen
//! protocol to come from the offered list; NPN lets the client pick a
//! protocol the server never listed.

use hext_utils::wire::{Reader, Writer};

use super::{Emission, HandlerResult, SendResult};
use crate::handshake::context::HandshakeContext;
use crate::{AlertDescription, TlsError};

/// Which extension negotiated the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFamily {
    Alpn,
    Npn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppProtocolPhase {
    #[default]
    Unset,
    ClientOffered,
    Negotiated(ProtocolFamily),
}

#[derive(Debug, Clone, Default)]
pub struct AppProtocolState {
    phase: AppProtocolPhase,
    selected: Option<Vec<u8>>,
}

impl AppProtocolState {
    pub fn phase(&self) -> AppProtocolPhase {
        self.phase
    }

    /// The agreed protocol. For a server using NPN this is only known
    /// after the NextProtocol message.
    pub fn selected(&self) -> Option<&[u8]> {
        self.selected.as_deref()
    }

    pub fn alpn_negotiated(&self) -> bool {
        self.phase == AppProtocolPhase::Negotiated(ProtocolFamily::Alpn)
    }

    pub fn npn_negotiated(&self) -> bool {
        self.phase == AppProtocolPhase::Negotiated(ProtocolFamily::Npn)
    }

    pub(crate) fn set_client_offered(&mut self) {
        if self.phase == AppProtocolPhase::Unset {
            self.phase = AppProtocolPhase::ClientOffered;
        }
    }

    fn negotiate(&mut self, family: ProtocolFamily, protocol: Option<Vec<u8>>) {
        self.phase = AppProtocolPhase::Negotiated(family);
        self.selected = protocol;
    }

    pub(crate) fn server_advertised_npn(&mut self) {
        self.negotiate(ProtocolFamily::Npn, None);
    }

    pub(crate) fn set_npn_selection(&mut self, protocol: Vec<u8>) {
        self.selected = Some(protocol);
    }

    /// Gate for an incoming NextProtocol handshake message: only legal
    /// when NPN, and not ALPN, was negotiated.
    pub fn check_next_protocol_message(&self) -> Result<(), TlsError> {
        match self.phase {
            AppProtocolPhase::Negotiated(ProtocolFamily::Npn) => Ok(()),
            AppProtocolPhase::Negotiated(ProtocolFamily::Alpn) => Err(TlsError::fatal(
                AlertDescription::UnexpectedMessage,
                "NextProtocol after ALPN",
            )),
            _ => Err(TlsError::fatal(
                AlertDescription::UnexpectedMessage,
                "NextProtocol without NPN",
            )),
        }
    }
}

/// Split `concat(len:u8, name[len])`, rejecting empty names and partial
/// entries.
pub fn parse_protocol_list(data: &[u8]) -> Result<Vec<&[u8]>, TlsError> {
    let mut r = Reader::new(data);
    let mut names = Vec::new();
    while !r.is_empty() {
        let name = r.read_var(1).map_err(|_| {
            TlsError::fatal(AlertDescription::DecodeError, "truncated protocol name")
        })?;
        if name.is_empty() {
            return Err(TlsError::fatal(
                AlertDescription::DecodeError,
                "empty protocol name",
            ));
        }
        names.push(name);
    }
    Ok(names)
}

fn list_len(protocols: &[Vec<u8>]) -> Result<usize, TlsError> {
    let mut total = 0;
    for p in protocols {
        if p.is_empty() || p.len() > 255 {
            return Err(TlsError::Internal(format!(
                "configured protocol name of {} bytes",
                p.len()
            )));
        }
        total += 1 + p.len();
    }
    Ok(total)
}

fn write_list(w: &mut Writer<'_>, protocols: &[Vec<u8>]) -> Result<(), hext_types::WireError> {
    for p in protocols {
        w.append_var(p, 1)?;
    }
    Ok(())
}

/// A selector's answer must fit a u8 length and not be empty.
fn check_selection(selected: Vec<u8>) -> Result<Vec<u8>, TlsError> {
    if selected.is_empty() || selected.len() > 255 {
        return Err(TlsError::fatal(
            AlertDescription::InternalError,
            format!("selected protocol of {} bytes", selected.len()),
        ));
    }
    Ok(selected)
}

/// First of the server's preferences that the client offered.
fn default_alpn_select(server_prefs: &[Vec<u8>], offered: &[&[u8]]) -> Option<Vec<u8>> {
    server_prefs
        .iter()
        .find(|p| offered.contains(&p.as_slice()))
        .cloned()
}

/// First server protocol the client supports, else the client's first.
fn default_npn_select(client_prefs: &[Vec<u8>], server_list: &[&[u8]]) -> Option<Vec<u8>> {
    server_list
        .iter()
        .find(|s| client_prefs.iter().any(|c| c.as_slice() == **s))
        .map(|s| s.to_vec())
        .or_else(|| client_prefs.first().cloned())
}

pub(crate) fn alpn_client_send(ctx: &HandshakeContext) -> SendResult<'_> {
    let protocols = &ctx.config.alpn_protocols;
    if protocols.is_empty() {
        return Ok(None);
    }
    let len = list_len(protocols)?;
    Ok(Some(Emission::new(2 + len, move |w| {
        w.append_nested(2, |l| write_list(l, protocols))
    })))
}

pub(crate) fn alpn_server_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    let mut r = Reader::new(data);
    let list = r.read_var(2)?;
    if !r.is_empty() {
        return Err(TlsError::fatal(
            AlertDescription::DecodeError,
            "trailing bytes after ALPN list",
        ));
    }
    let offered = parse_protocol_list(list)?;
    if offered.is_empty() {
        return Err(TlsError::fatal(AlertDescription::DecodeError, "empty ALPN list"));
    }
    let config = std::sync::Arc::clone(&ctx.config);
    let selected = match &config.alpn_selector {
        Some(select) => select(offered.as_slice()),
        None if config.alpn_protocols.is_empty() => return Ok(None),
        None => default_alpn_select(&config.alpn_protocols, &offered),
    };
    let Some(selected) = selected else {
        return Err(TlsError::fatal(
            AlertDescription::NoApplicationProtocol,
            "no common application protocol",
        ));
    };
    let selected = check_selection(selected)?;
    if !offered.contains(&selected.as_slice()) {
        return Err(TlsError::fatal(
            AlertDescription::NoApplicationProtocol,
            "selected protocol was not offered",
        ));
    }
    tracing::debug!(protocol = %String::from_utf8_lossy(&selected), "ALPN negotiated");
    ctx.app_protocol.negotiate(ProtocolFamily::Alpn, Some(selected));
    Ok(Some(alpn_server_reply))
}

fn alpn_server_reply(ctx: &HandshakeContext) -> SendResult<'_> {
    if !ctx.app_protocol.alpn_negotiated() {
        return Ok(None);
    }
    let Some(p) = ctx.app_protocol.selected() else {
        return Ok(None);
    };
    Ok(Some(Emission::new(3 + p.len(), move |w| {
        w.append_nested(2, |l| l.append_var(p, 1))
    })))
}

pub(crate) fn alpn_client_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    if ctx.app_protocol.npn_negotiated() {
        return Err(TlsError::fatal(
            AlertDescription::IllegalParameter,
            "ALPN after NPN",
        ));
    }
    let mut r = Reader::new(data);
    let list = r.read_var(2)?;
    if !r.is_empty() {
        return Err(TlsError::fatal(
            AlertDescription::DecodeError,
            "trailing bytes after ALPN list",
        ));
    }
    let names = parse_protocol_list(list)?;
    let [name] = names.as_slice() else {
        return Err(TlsError::fatal(
            AlertDescription::IllegalParameter,
            format!("server selected {} ALPN protocols", names.len()),
        ));
    };
    if !ctx.config.alpn_protocols.iter().any(|p| p.as_slice() == *name) {
        return Err(TlsError::fatal(
            AlertDescription::IllegalParameter,
            "server selected a protocol we did not offer",
        ));
    }
    let name = name.to_vec();
    tracing::debug!(protocol = %String::from_utf8_lossy(&name), "ALPN negotiated");
    ctx.app_protocol.negotiate(ProtocolFamily::Alpn, Some(name));
    Ok(None)
}

pub(crate) fn npn_client_send(ctx: &HandshakeContext) -> SendResult<'_> {
    let config = &ctx.config;
    if !config.allows_pre_tls13()
        || (config.npn_protocols.is_empty() && config.npn_selector.is_none())
    {
        return Ok(None);
    }
    Ok(Some(Emission::empty()))
}

pub(crate) fn npn_server_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    if !data.is_empty() {
        return Err(TlsError::fatal(
            AlertDescription::DecodeError,
            "NPN in ClientHello must be empty",
        ));
    }
    if ctx.config.npn_protocols.is_empty() {
        return Ok(None);
    }
    Ok(Some(npn_server_reply))
}

/// Suppressed when ALPN already won.
fn npn_server_reply(ctx: &HandshakeContext) -> SendResult<'_> {
    if ctx.app_protocol.alpn_negotiated() {
        return Ok(None);
    }
    let protocols = &ctx.config.npn_protocols;
    let len = list_len(protocols)?;
    Ok(Some(Emission::new(len, move |w| write_list(w, protocols))))
}

pub(crate) fn npn_client_handle(ctx: &mut HandshakeContext, data: &[u8]) -> HandlerResult {
    if ctx.app_protocol.alpn_negotiated() {
        return Err(TlsError::fatal(
            AlertDescription::IllegalParameter,
            "NPN after ALPN",
        ));
    }
    let server_list = parse_protocol_list(data)?;
    let config = std::sync::Arc::clone(&ctx.config);
    let selected = match &config.npn_selector {
        Some(select) => select(server_list.as_slice()),
        None => default_npn_select(&config.npn_protocols, &server_list),
    };
    let Some(selected) = selected else {
        return Err(TlsError::fatal(
            AlertDescription::InternalError,
            "no NPN protocol selected",
        ));
    };
    let selected = check_selection(selected)?;
    tracing::debug!(
        protocol = %String::from_utf8_lossy(&selected),
        listed = server_list.contains(&selected.as_slice()),
        "NPN negotiated"
    );
    ctx.app_protocol.negotiate(ProtocolFamily::Npn, Some(selected));
    Ok(None)
}
