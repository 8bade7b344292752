//! Connection-local state shared by the dispatch engine, the sender engine
//! and the built-in extension handlers.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use hext_utils::wire::{Reader, Writer};
use once_cell::unsync::OnceCell;
use zeroize::Zeroizing;

use super::key_exchange::KeyExchange;
use super::negotiation::NegotiationState;
use crate::config::TlsConfig;
use crate::crypt::{NamedGroup, SignatureScheme};
use crate::extensions::builtin::key_share::KeyShareEntry;
use crate::extensions::{
    self, dispatch, registry, AppProtocolState, Emission, ExtensionEmitter, ExtensionType,
    MessageKind,
};
use crate::session::{
    decode_new_session_ticket, encode_new_session_ticket, issue_ticket, NewSessionTicket,
    ResumedSession, SessionState,
};
use crate::{AlertDescription, ProtocolVersion, TlsError, TlsRole};

/// What the peer's hello told us.
#[derive(Debug, Clone, Default)]
pub struct PeerHello {
    pub server_name: Option<Vec<u8>>,
    pub supported_groups: Vec<NamedGroup>,
    pub signature_algorithms: Vec<SignatureScheme>,
    pub ec_point_formats: Vec<u8>,
    pub supported_versions: Vec<ProtocolVersion>,
    pub psk_key_exchange_modes: Vec<u8>,
}

/// TLS 1.3 key-share state.
#[derive(Debug, Default)]
pub struct KeyShareState {
    /// Our ephemeral key pair, generated on first use.
    pub(crate) ephemeral: OnceCell<KeyExchange>,
    /// Entries the peer offered, in order.
    pub peer_entries: Vec<KeyShareEntry>,
    pub selected: Option<NamedGroup>,
    /// Group to request in a HelloRetryRequest when no offered share fits.
    pub retry_group: Option<NamedGroup>,
    pub(crate) shared_secret: Option<Zeroizing<Vec<u8>>>,
}

/// Session resumption progress.
#[derive(Debug, Default)]
pub struct ResumptionState {
    pub resumed: Option<ResumedSession>,
    /// Client: the server promised a NewSessionTicket.
    pub expect_new_session_ticket: bool,
    /// Client: a PSK identity was offered.
    pub psk_offered: bool,
    /// Identity index the server selected.
    pub psk_selected: Option<u16>,
}

/// Finished verify_data from the handshake being renegotiated.
#[derive(Debug, Clone, Default)]
pub struct RenegotiationState {
    pub client_verify_data: Vec<u8>,
    pub server_verify_data: Vec<u8>,
    /// Both sides support RFC 5746 secure renegotiation.
    pub secure: bool,
}

#[derive(Debug, Clone, Copy)]
enum Clock {
    System,
    Fixed(u32),
}

/// Extension state for one handshake attempt.
#[derive(Debug)]
pub struct HandshakeContext {
    pub(crate) config: Arc<TlsConfig>,
    role: TlsRole,
    version: ProtocolVersion,
    pub(crate) negotiation: NegotiationState,
    pub(crate) app_protocol: AppProtocolState,
    pub(crate) peer: PeerHello,
    pub(crate) key_share: KeyShareState,
    pub(crate) resumption: ResumptionState,
    pub(crate) renegotiation: RenegotiationState,
    pub(crate) extended_master_secret: bool,
    clock: Clock,
}

impl HandshakeContext {
    /// State for an initial handshake.
    pub fn new(config: Arc<TlsConfig>) -> Self {
        Self {
            role: config.role,
            version: config.max_version,
            config,
            negotiation: NegotiationState::new(),
            app_protocol: AppProtocolState::default(),
            peer: PeerHello::default(),
            key_share: KeyShareState::default(),
            resumption: ResumptionState::default(),
            renegotiation: RenegotiationState::default(),
            extended_master_secret: false,
            clock: Clock::System,
        }
    }

    /// Fresh state for a renegotiation of a connection whose last
    /// handshake finished with the given verify_data.
    pub fn renegotiating(
        config: Arc<TlsConfig>,
        client_verify_data: &[u8],
        server_verify_data: &[u8],
    ) -> Self {
        let mut ctx = Self::new(config);
        ctx.renegotiation = RenegotiationState {
            client_verify_data: client_verify_data.to_vec(),
            server_verify_data: server_verify_data.to_vec(),
            secure: false,
        };
        ctx
    }

    /// Pin the clock used for ticket ages and expiry.
    pub fn with_time(mut self, now: u32) -> Self {
        self.clock = Clock::Fixed(now);
        self
    }

    /// Current time in seconds.
    pub fn now(&self) -> u32 {
        match self.clock {
            Clock::Fixed(t) => t,
            Clock::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as u32)
                .unwrap_or(0),
        }
    }

    pub fn config(&self) -> &TlsConfig {
        &self.config
    }

    pub fn role(&self) -> TlsRole {
        self.role
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Set the version the handler tables are chosen by.
    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    pub fn negotiation(&self) -> &NegotiationState {
        &self.negotiation
    }

    pub fn app_protocol(&self) -> &AppProtocolState {
        &self.app_protocol
    }

    pub fn peer(&self) -> &PeerHello {
        &self.peer
    }

    pub fn key_share(&self) -> &KeyShareState {
        &self.key_share
    }

    pub fn resumption(&self) -> &ResumptionState {
        &self.resumption
    }

    pub fn resumed_session(&self) -> Option<&ResumedSession> {
        self.resumption.resumed.as_ref()
    }

    pub fn renegotiation(&self) -> &RenegotiationState {
        &self.renegotiation
    }

    pub fn extended_master_secret(&self) -> bool {
        self.extended_master_secret
    }

    /// The (EC)DHE shared secret once both key shares are known.
    pub fn shared_secret(&self) -> Option<&[u8]> {
        self.key_share.shared_secret.as_deref().map(|s| &s[..])
    }

    /// Our ephemeral key pair for `group`, generated on first use.
    pub(crate) fn ephemeral_key(&self, group: NamedGroup) -> Result<&KeyExchange, TlsError> {
        let kx = self
            .key_share
            .ephemeral
            .get_or_try_init(|| KeyExchange::generate(group))?;
        if kx.group() != group {
            return Err(TlsError::Internal(format!(
                "ephemeral key is for {:?}, not {:?}",
                kx.group(),
                group
            )));
        }
        Ok(kx)
    }

    /// Settle the protocol version from a received hello before its
    /// extensions are dispatched, so the right handler table is used.
    ///
    /// Server: the highest common entry of supported_versions, else the
    /// legacy version capped at our maximum. Client: TLS 1.3 if the
    /// ServerHello carries supported_versions, else its legacy version.
    pub fn pre_negotiate_version(
        &mut self,
        legacy_version: ProtocolVersion,
        blob: &[u8],
    ) -> Result<ProtocolVersion, TlsError> {
        let sv = extensions::find_extension(blob, ExtensionType::SupportedVersions);
        let version = match (self.role, sv) {
            (TlsRole::Server, Some(data)) => {
                let offered = extensions::builtin::versions::parse_client_versions(data)?;
                extensions::builtin::versions::select_version(&self.config, &offered)
                    .ok_or_else(|| {
                        TlsError::fatal(AlertDescription::ProtocolVersion, "no common version")
                    })?
            }
            (TlsRole::Server, None) => {
                let v = legacy_version.min(self.config.max_version.min(ProtocolVersion::TLS12));
                if v < self.config.min_version {
                    return Err(TlsError::fatal(
                        AlertDescription::ProtocolVersion,
                        format!("client version 0x{:04x} too old", legacy_version.0),
                    ));
                }
                v
            }
            (TlsRole::Client, Some(_)) => ProtocolVersion::TLS13,
            (TlsRole::Client, None) => {
                if !self.config.allows_version(legacy_version) {
                    return Err(TlsError::fatal(
                        AlertDescription::ProtocolVersion,
                        format!("server chose 0x{:04x}", legacy_version.0),
                    ));
                }
                legacy_version
            }
        };
        self.version = version;
        Ok(version)
    }

    /// Run the dispatch engine over a received extension block.
    pub fn dispatch(&mut self, kind: MessageKind, blob: &[u8]) -> Result<(), TlsError> {
        dispatch::dispatch(self, kind, blob)
    }

    /// Build the ClientHello extension block into `out`.
    ///
    /// `hello_prefix_len` is the size of the ClientHello body before the
    /// extension block, its 2-byte length field included and the 4-byte
    /// handshake header excluded; it sizes the padding extension.
    pub fn build_client_hello_extensions(
        &mut self,
        hello_prefix_len: usize,
        out: &mut Vec<u8>,
    ) -> Result<Vec<ExtensionType>, TlsError> {
        let config = Arc::clone(&self.config);
        let ctx = MessageKind::ClientHello.context();
        let written = {
            let mut emitter =
                ExtensionEmitter::plan(self, registry::client_hello_senders().iter().copied())?;
            for custom in config.custom_extensions.iter().filter(|c| c.context.contains(ctx)) {
                if let Some(data) = (custom.add_cb)(ctx) {
                    emitter.push(ExtensionType::from(custom.extension_type), Emission::bytes(data));
                }
            }
            if config.enable_padding && config.allows_pre_tls13() {
                emitter.insert_padding(hello_prefix_len);
            }
            emitter.write(out, config.max_extensions_len)?
        };
        self.negotiation.record_advertised(written.iter().copied());
        if written.contains(&ExtensionType::Alpn)
            || written.contains(&ExtensionType::NextProtocolNegotiation)
        {
            self.app_protocol.set_client_offered();
        }
        self.resumption.psk_offered = written.contains(&ExtensionType::PreSharedKey);
        tracing::debug!(count = written.len(), len = out.len(), "built ClientHello extensions");
        Ok(written)
    }

    /// Build the extension block of a ServerHello or EncryptedExtensions
    /// from the replies queued while dispatching the ClientHello.
    pub fn build_reply_extensions(
        &mut self,
        kind: MessageKind,
        out: &mut Vec<u8>,
    ) -> Result<Vec<ExtensionType>, TlsError> {
        if kind == MessageKind::ClientHello || self.role != TlsRole::Server {
            return Err(TlsError::Internal(format!("no {kind:?} reply for {:?}", self.role)));
        }
        let config = Arc::clone(&self.config);
        let senders =
            self.negotiation
                .take_reply_senders(kind, self.version, &config.tls13_policy);
        let ctx = kind.context();
        let written = {
            let mut emitter = ExtensionEmitter::plan(self, senders)?;
            for custom in config.custom_extensions.iter().filter(|c| c.context.contains(ctx)) {
                let ty = ExtensionType::from(custom.extension_type);
                if !self.negotiation.is_negotiated(ty) {
                    continue;
                }
                if let Some(data) = (custom.add_cb)(ctx) {
                    emitter.push(ty, Emission::bytes(data));
                }
            }
            emitter.write(out, config.max_extensions_len)?
        };
        if written.contains(&ExtensionType::NextProtocolNegotiation) {
            self.app_protocol.server_advertised_npn();
        }
        tracing::debug!(?kind, count = written.len(), "built reply extensions");
        Ok(written)
    }

    /// Server: accept the client's NextProtocol handshake message.
    ///
    /// Body: `selected_protocol(u8 len) || padding(u8 len)`.
    pub fn process_next_protocol<'b>(&mut self, body: &'b [u8]) -> Result<&'b [u8], TlsError> {
        self.app_protocol.check_next_protocol_message()?;
        let mut r = Reader::new(body);
        let proto = r.read_var(1)?;
        let _padding = r.read_var(1)?;
        if !r.is_empty() || proto.is_empty() {
            return Err(TlsError::fatal(
                AlertDescription::DecodeError,
                "malformed NextProtocol message",
            ));
        }
        self.app_protocol.set_npn_selection(proto.to_vec());
        Ok(proto)
    }

    /// Client: the NextProtocol message body for the protocol NPN chose,
    /// padded so the body length is a multiple of 32.
    pub fn build_next_protocol(&self) -> Result<Vec<u8>, TlsError> {
        let proto = match (self.role, self.app_protocol.npn_negotiated()) {
            (TlsRole::Client, true) => self.app_protocol.selected(),
            _ => None,
        };
        let Some(proto) = proto else {
            return Err(TlsError::Internal("no NPN selection to send".into()));
        };
        let padding = 32 - ((proto.len() + 2) % 32);
        let mut out = Vec::with_capacity(proto.len() + 2 + padding);
        let mut w = Writer::unbounded(&mut out);
        w.append_var(proto, 1)?;
        w.append_var(&vec![0u8; padding], 1)?;
        Ok(out)
    }

    /// Server: a NewSessionTicket body carrying `state` sealed under the
    /// configured ticket keys.
    pub fn issue_new_session_ticket(&self, state: &SessionState) -> Result<Vec<u8>, TlsError> {
        let keys = self
            .config
            .ticket_keys
            .as_ref()
            .ok_or_else(|| TlsError::Internal("no ticket keys configured".into()))?;
        let ticket = issue_ticket(keys, state)?;
        Ok(encode_new_session_ticket(self.config.ticket_lifetime_hint, &ticket)?)
    }

    /// Client: parse a NewSessionTicket the server promised.
    pub fn receive_new_session_ticket(&mut self, body: &[u8]) -> Result<NewSessionTicket, TlsError> {
        if !self.resumption.expect_new_session_ticket {
            return Err(TlsError::fatal(
                AlertDescription::UnexpectedMessage,
                "NewSessionTicket without session_ticket extension",
            ));
        }
        self.resumption.expect_new_session_ticket = false;
        decode_new_session_ticket(body)
    }
}
