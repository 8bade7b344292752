//! Extension-engine configuration with builder pattern.

use std::fmt;
use std::sync::Arc;

use crate::crypt::{NamedGroup, SignatureScheme};
use crate::extensions::{CustomExtension, Tls13Policy};
use crate::session::SessionTicketKeys;
use crate::{ProtocolVersion, TlsRole};

/// Picks one protocol from the peer's list, or `None` to decline.
pub type ProtocolSelector = Arc<dyn Fn(&[&[u8]]) -> Option<Vec<u8>> + Send + Sync>;

/// A ticket the client received earlier and offers for resumption.
#[derive(Clone)]
pub struct ClientTicket {
    pub ticket: Vec<u8>,
    /// When the ticket was received, in seconds.
    pub received_at: u32,
    /// `ticket_age_add` from the TLS 1.3 NewSessionTicket; 0 for TLS 1.2.
    pub age_add: u32,
}

impl fmt::Debug for ClientTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientTicket")
            .field("ticket", &format!("[{} bytes]", self.ticket.len()))
            .field("received_at", &self.received_at)
            .finish_non_exhaustive()
    }
}

/// Extension-engine configuration.
#[derive(Clone)]
pub struct TlsConfig {
    pub role: TlsRole,
    pub min_version: ProtocolVersion,
    pub max_version: ProtocolVersion,
    /// Host name sent in server_name (client).
    pub server_name: Option<String>,
    /// ALPN protocols in preference order.
    pub alpn_protocols: Vec<Vec<u8>>,
    /// NPN protocols (server: advertised list; client: preference).
    pub npn_protocols: Vec<Vec<u8>>,
    pub alpn_selector: Option<ProtocolSelector>,
    pub npn_selector: Option<ProtocolSelector>,
    pub supported_groups: Vec<NamedGroup>,
    pub signature_algorithms: Vec<SignatureScheme>,
    /// Group for the client's single key share.
    pub key_share_group: NamedGroup,
    pub session_tickets: bool,
    /// Seconds a ticket stays valid. Default: 172800 (2 days).
    pub ticket_lifetime_hint: u32,
    /// Server ticket keys; usually the process-wide keys.
    pub ticket_keys: Option<Arc<SessionTicketKeys>>,
    pub resumption_ticket: Option<ClientTicket>,
    /// Length of the placeholder PSK binder. Default: 32.
    pub psk_binder_len: usize,
    /// Enable Extended Master Secret extension (RFC 7627). Default: true.
    pub enable_extended_master_secret: bool,
    /// Enable the padding extension (RFC 7685). Default: true.
    pub enable_padding: bool,
    pub tls13_policy: Tls13Policy,
    pub custom_extensions: Vec<CustomExtension>,
    /// Byte budget for an outgoing extension block. Default: 0xFFFF.
    pub max_extensions_len: usize,
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("role", &self.role)
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("server_name", &self.server_name)
            .field("alpn_protocols", &self.alpn_protocols.len())
            .field("npn_protocols", &self.npn_protocols.len())
            .field("alpn_selector", &self.alpn_selector.as_ref().map(|_| "<callback>"))
            .field("npn_selector", &self.npn_selector.as_ref().map(|_| "<callback>"))
            .field("session_tickets", &self.session_tickets)
            .field("ticket_keys", &self.ticket_keys)
            .field("resumption_ticket", &self.resumption_ticket)
            .field("tls13_policy", &self.tls13_policy.revision)
            .finish_non_exhaustive()
    }
}

impl TlsConfig {
    /// Create a builder for the configuration.
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Whether any version in the configured range is TLS 1.2 or older.
    pub fn allows_pre_tls13(&self) -> bool {
        !self.min_version.is_tls13()
    }

    /// Whether TLS 1.3 is in the configured range.
    pub fn allows_tls13(&self) -> bool {
        self.max_version.is_tls13()
    }

    pub fn allows_version(&self, v: ProtocolVersion) -> bool {
        self.min_version <= v && v <= self.max_version
    }
}

/// Builder for `TlsConfig`.
pub struct TlsConfigBuilder {
    config: TlsConfig,
}

impl Default for TlsConfigBuilder {
    fn default() -> Self {
        Self {
            config: TlsConfig {
                role: TlsRole::Client,
                min_version: ProtocolVersion::TLS12,
                max_version: ProtocolVersion::TLS13,
                server_name: None,
                alpn_protocols: Vec::new(),
                npn_protocols: Vec::new(),
                alpn_selector: None,
                npn_selector: None,
                supported_groups: vec![NamedGroup::X25519, NamedGroup::SECP256R1],
                signature_algorithms: vec![
                    SignatureScheme::RSA_PSS_RSAE_SHA256,
                    SignatureScheme::ECDSA_SECP256R1_SHA256,
                    SignatureScheme::ED25519,
                ],
                key_share_group: NamedGroup::X25519,
                session_tickets: true,
                ticket_lifetime_hint: 172_800,
                ticket_keys: None,
                resumption_ticket: None,
                psk_binder_len: 32,
                enable_extended_master_secret: true,
                enable_padding: true,
                tls13_policy: Tls13Policy::RFC8446,
                custom_extensions: Vec::new(),
                max_extensions_len: 0xFFFF,
            },
        }
    }
}

impl fmt::Debug for TlsConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfigBuilder")
            .field("role", &self.config.role)
            .finish_non_exhaustive()
    }
}

impl TlsConfigBuilder {
    pub fn role(mut self, role: TlsRole) -> Self {
        self.config.role = role;
        self
    }

    pub fn min_version(mut self, version: ProtocolVersion) -> Self {
        self.config.min_version = version;
        self
    }

    pub fn max_version(mut self, version: ProtocolVersion) -> Self {
        self.config.max_version = version;
        self
    }

    pub fn server_name(mut self, name: &str) -> Self {
        self.config.server_name = Some(name.to_string());
        self
    }

    pub fn alpn(mut self, protocols: &[&[u8]]) -> Self {
        self.config.alpn_protocols = protocols.iter().map(|p| p.to_vec()).collect();
        self
    }

    pub fn npn(mut self, protocols: &[&[u8]]) -> Self {
        self.config.npn_protocols = protocols.iter().map(|p| p.to_vec()).collect();
        self
    }

    pub fn alpn_selector(mut self, selector: ProtocolSelector) -> Self {
        self.config.alpn_selector = Some(selector);
        self
    }

    pub fn npn_selector(mut self, selector: ProtocolSelector) -> Self {
        self.config.npn_selector = Some(selector);
        self
    }

    pub fn supported_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.config.supported_groups = groups.to_vec();
        self
    }

    pub fn signature_algorithms(mut self, schemes: &[SignatureScheme]) -> Self {
        self.config.signature_algorithms = schemes.to_vec();
        self
    }

    pub fn key_share_group(mut self, group: NamedGroup) -> Self {
        self.config.key_share_group = group;
        self
    }

    pub fn session_tickets(mut self, enabled: bool) -> Self {
        self.config.session_tickets = enabled;
        self
    }

    pub fn ticket_lifetime_hint(mut self, secs: u32) -> Self {
        self.config.ticket_lifetime_hint = secs;
        self
    }

    pub fn ticket_keys(mut self, keys: Arc<SessionTicketKeys>) -> Self {
        self.config.ticket_keys = Some(keys);
        self
    }

    pub fn resumption_ticket(mut self, ticket: ClientTicket) -> Self {
        self.config.resumption_ticket = Some(ticket);
        self
    }

    pub fn psk_binder_len(mut self, len: usize) -> Self {
        self.config.psk_binder_len = len;
        self
    }

    pub fn enable_extended_master_secret(mut self, enabled: bool) -> Self {
        self.config.enable_extended_master_secret = enabled;
        self
    }

    pub fn enable_padding(mut self, enabled: bool) -> Self {
        self.config.enable_padding = enabled;
        self
    }

    pub fn tls13_policy(mut self, policy: Tls13Policy) -> Self {
        self.config.tls13_policy = policy;
        self
    }

    pub fn custom_extension(mut self, ext: CustomExtension) -> Self {
        self.config.custom_extensions.push(ext);
        self
    }

    pub fn max_extensions_len(mut self, max: usize) -> Self {
        self.config.max_extensions_len = max;
        self
    }

    pub fn build(self) -> TlsConfig {
        self.config
    }
}
