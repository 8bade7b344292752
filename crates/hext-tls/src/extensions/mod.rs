//! TLS hello extensions: type model, registry, dispatch and emission.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use hext_utils::wire::Reader;

use crate::handshake::context::HandshakeContext;
use crate::TlsError;

pub mod app_protocol;
pub mod builtin;
pub mod dispatch;
pub mod policy;
pub mod registry;
pub mod sender;

pub use app_protocol::{AppProtocolPhase, AppProtocolState, ProtocolFamily};
pub use policy::Tls13Policy;
pub use sender::{Emission, ExtensionEmitter};

/// TLS extension type codes.
///
/// Equality, ordering and hashing follow the wire value, so
/// `Unknown(0)` and `ServerName` are the same key.
#[derive(Debug, Clone, Copy)]
pub enum ExtensionType {
    ServerName,
    MaxFragmentLength,
    StatusRequest,
    SupportedGroups,
    EcPointFormats,
    SignatureAlgorithms,
    UseSrtp,
    Heartbeat,
    Alpn,
    SignedCertificateTimestamp,
    ClientCertificateType,
    ServerCertificateType,
    Padding,
    EncryptThenMac,
    ExtendedMasterSecret,
    SessionTicket,
    PreSharedKey,
    EarlyData,
    SupportedVersions,
    Cookie,
    PskKeyExchangeModes,
    CertificateAuthorities,
    PostHandshakeAuth,
    SignatureAlgorithmsCert,
    KeyShare,
    NextProtocolNegotiation,
    RenegotiationInfo,
    Unknown(u16),
}

impl ExtensionType {
    /// The 16-bit code point.
    pub const fn code(self) -> u16 {
        match self {
            ExtensionType::ServerName => 0,
            ExtensionType::MaxFragmentLength => 1,
            ExtensionType::StatusRequest => 5,
            ExtensionType::SupportedGroups => 10,
            ExtensionType::EcPointFormats => 11,
            ExtensionType::SignatureAlgorithms => 13,
            ExtensionType::UseSrtp => 14,
            ExtensionType::Heartbeat => 15,
            ExtensionType::Alpn => 16,
            ExtensionType::SignedCertificateTimestamp => 18,
            ExtensionType::ClientCertificateType => 19,
            ExtensionType::ServerCertificateType => 20,
            ExtensionType::Padding => 21,
            ExtensionType::EncryptThenMac => 22,
            ExtensionType::ExtendedMasterSecret => 23,
            ExtensionType::SessionTicket => 35,
            ExtensionType::PreSharedKey => 41,
            ExtensionType::EarlyData => 42,
            ExtensionType::SupportedVersions => 43,
            ExtensionType::Cookie => 44,
            ExtensionType::PskKeyExchangeModes => 45,
            ExtensionType::CertificateAuthorities => 47,
            ExtensionType::PostHandshakeAuth => 49,
            ExtensionType::SignatureAlgorithmsCert => 50,
            ExtensionType::KeyShare => 51,
            ExtensionType::NextProtocolNegotiation => 13172,
            ExtensionType::RenegotiationInfo => 0xFF01,
            ExtensionType::Unknown(v) => v,
        }
    }

    /// IANA name, or `None` for unregistered values.
    pub fn name(self) -> Option<&'static str> {
        let name = match ExtensionType::from(self.code()) {
            ExtensionType::ServerName => "server_name",
            ExtensionType::MaxFragmentLength => "max_fragment_length",
            ExtensionType::StatusRequest => "status_request",
            ExtensionType::SupportedGroups => "supported_groups",
            ExtensionType::EcPointFormats => "ec_point_formats",
            ExtensionType::SignatureAlgorithms => "signature_algorithms",
            ExtensionType::UseSrtp => "use_srtp",
            ExtensionType::Heartbeat => "heartbeat",
            ExtensionType::Alpn => "application_layer_protocol_negotiation",
            ExtensionType::SignedCertificateTimestamp => "signed_certificate_timestamp",
            ExtensionType::ClientCertificateType => "client_certificate_type",
            ExtensionType::ServerCertificateType => "server_certificate_type",
            ExtensionType::Padding => "padding",
            ExtensionType::EncryptThenMac => "encrypt_then_mac",
            ExtensionType::ExtendedMasterSecret => "extended_master_secret",
            ExtensionType::SessionTicket => "session_ticket",
            ExtensionType::PreSharedKey => "pre_shared_key",
            ExtensionType::EarlyData => "early_data",
            ExtensionType::SupportedVersions => "supported_versions",
            ExtensionType::Cookie => "cookie",
            ExtensionType::PskKeyExchangeModes => "psk_key_exchange_modes",
            ExtensionType::CertificateAuthorities => "certificate_authorities",
            ExtensionType::PostHandshakeAuth => "post_handshake_auth",
            ExtensionType::SignatureAlgorithmsCert => "signature_algorithms_cert",
            ExtensionType::KeyShare => "key_share",
            ExtensionType::NextProtocolNegotiation => "next_protocol_negotiation",
            ExtensionType::RenegotiationInfo => "renegotiation_info",
            ExtensionType::Unknown(_) => return None,
        };
        Some(name)
    }
}

impl From<u16> for ExtensionType {
    fn from(v: u16) -> Self {
        match v {
            0 => ExtensionType::ServerName,
            1 => ExtensionType::MaxFragmentLength,
            5 => ExtensionType::StatusRequest,
            10 => ExtensionType::SupportedGroups,
            11 => ExtensionType::EcPointFormats,
            13 => ExtensionType::SignatureAlgorithms,
            14 => ExtensionType::UseSrtp,
            15 => ExtensionType::Heartbeat,
            16 => ExtensionType::Alpn,
            18 => ExtensionType::SignedCertificateTimestamp,
            19 => ExtensionType::ClientCertificateType,
            20 => ExtensionType::ServerCertificateType,
            21 => ExtensionType::Padding,
            22 => ExtensionType::EncryptThenMac,
            23 => ExtensionType::ExtendedMasterSecret,
            35 => ExtensionType::SessionTicket,
            41 => ExtensionType::PreSharedKey,
            42 => ExtensionType::EarlyData,
            43 => ExtensionType::SupportedVersions,
            44 => ExtensionType::Cookie,
            45 => ExtensionType::PskKeyExchangeModes,
            47 => ExtensionType::CertificateAuthorities,
            49 => ExtensionType::PostHandshakeAuth,
            50 => ExtensionType::SignatureAlgorithmsCert,
            51 => ExtensionType::KeyShare,
            13172 => ExtensionType::NextProtocolNegotiation,
            0xFF01 => ExtensionType::RenegotiationInfo,
            other => ExtensionType::Unknown(other),
        }
    }
}

impl From<ExtensionType> for u16 {
    fn from(t: ExtensionType) -> u16 {
        t.code()
    }
}

impl PartialEq for ExtensionType {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code()
    }
}

impl Eq for ExtensionType {}

impl Hash for ExtensionType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code().hash(state);
    }
}

impl PartialOrd for ExtensionType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExtensionType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code().cmp(&other.code())
    }
}

impl fmt::Display for ExtensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "unknown(0x{:04x})", self.code()),
        }
    }
}

/// A single parsed TLV: a view into the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionRecord<'a> {
    pub ext_type: ExtensionType,
    pub data: &'a [u8],
}

impl<'a> ExtensionRecord<'a> {
    /// Read one `type(2) || len(2) || data[len]` record.
    pub fn read(r: &mut Reader<'a>) -> Result<Self, hext_types::WireError> {
        let ext_type = ExtensionType::from(r.read_u16()?);
        let data = r.read_var(2)?;
        Ok(Self { ext_type, data })
    }
}

/// Iterate the records of an extension block (no outer length prefix).
///
/// Yields an error once and then stops if the block ends mid-record.
pub fn records(blob: &[u8]) -> impl Iterator<Item = Result<ExtensionRecord<'_>, TlsError>> {
    let mut r = Reader::new(blob);
    let mut failed = false;
    std::iter::from_fn(move || {
        if failed || r.is_empty() {
            return None;
        }
        match ExtensionRecord::read(&mut r) {
            Ok(rec) => Some(Ok(rec)),
            Err(e) => {
                failed = true;
                Some(Err(e.into()))
            }
        }
    })
}

/// First record of type `ty` in an extension block, ignoring malformed tails.
pub fn find_extension(blob: &[u8], ty: ExtensionType) -> Option<&[u8]> {
    records(blob)
        .map_while(Result::ok)
        .find(|rec| rec.ext_type == ty)
        .map(|rec| rec.data)
}

/// The hello message an extension block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ClientHello,
    ServerHello,
    EncryptedExtensions,
}

impl MessageKind {
    /// The custom-extension context bit for this message.
    pub fn context(self) -> ExtensionContext {
        match self {
            MessageKind::ClientHello => ExtensionContext::CLIENT_HELLO,
            MessageKind::ServerHello => ExtensionContext::SERVER_HELLO,
            MessageKind::EncryptedExtensions => ExtensionContext::ENCRYPTED_EXTENSIONS,
        }
    }
}

/// Result of a receive handler: an optional sender for the reply.
pub type HandlerResult = Result<Option<SenderFn>, TlsError>;

/// Receive-side handler for one extension type.
pub type Handler = fn(&mut HandshakeContext, &[u8]) -> HandlerResult;

/// Result of a sender: `None` when the extension does not apply.
pub type SendResult<'c> = Result<Option<Emission<'c>>, TlsError>;

/// Emit-side function for one extension type.
pub type SenderFn = for<'c> fn(&'c HandshakeContext) -> SendResult<'c>;

/// Context flags indicating where a custom extension is sent/received.
///
/// A custom extension is active in all message types whose bits are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionContext(pub u32);

impl ExtensionContext {
    pub const CLIENT_HELLO: Self = Self(0x0001);
    pub const SERVER_HELLO: Self = Self(0x0002);
    pub const ENCRYPTED_EXTENSIONS: Self = Self(0x0010);

    /// Returns true if `other` context is included in this context.
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for ExtensionContext {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Callback to build custom extension data.
///
/// Return `Some(data)` to include the extension, or `None` to skip it.
pub type CustomExtAddCallback = Arc<dyn Fn(ExtensionContext) -> Option<Vec<u8>> + Send + Sync>;

/// Callback to parse received custom extension data.
///
/// Return `Ok(())` on success, or `Err(alert_code)` to abort with an alert.
pub type CustomExtParseCallback =
    Arc<dyn Fn(ExtensionContext, &[u8]) -> Result<(), u8> + Send + Sync>;

/// Registration for a single application-defined extension.
#[derive(Clone)]
pub struct CustomExtension {
    /// Extension type code (must not collide with built-in extensions).
    pub extension_type: u16,
    /// Bitmask of message contexts where this extension is active.
    pub context: ExtensionContext,
    pub add_cb: CustomExtAddCallback,
    pub parse_cb: CustomExtParseCallback,
}

impl fmt::Debug for CustomExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomExtension")
            .field("extension_type", &self.extension_type)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// The custom extension registered for `ty` in `ctx`, if any.
pub fn find_custom(
    custom_exts: &[CustomExtension],
    ty: ExtensionType,
    ctx: ExtensionContext,
) -> Option<&CustomExtension> {
    custom_exts
        .iter()
        .find(|c| c.extension_type == ty.code() && c.context.contains(ctx))
}
