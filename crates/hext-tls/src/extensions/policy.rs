//! Which extensions TLS 1.3 permits in which message.

use super::{ExtensionType, MessageKind};

/// A versioned TLS 1.3 extension allow-list.
///
/// Extensions absent from the ClientHello list are skipped when received;
/// absent from the ServerHello or EncryptedExtensions lists they are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tls13Policy {
    /// Document the lists were taken from.
    pub revision: &'static str,
    pub client_hello: &'static [ExtensionType],
    pub server_hello: &'static [ExtensionType],
    pub encrypted_extensions: &'static [ExtensionType],
}

impl Tls13Policy {
    /// RFC 8446 section 4.2.
    pub const RFC8446: Tls13Policy = Tls13Policy {
        revision: "RFC 8446",
        client_hello: &[
            ExtensionType::ServerName,
            ExtensionType::MaxFragmentLength,
            ExtensionType::StatusRequest,
            ExtensionType::SupportedGroups,
            ExtensionType::SignatureAlgorithms,
            ExtensionType::UseSrtp,
            ExtensionType::Heartbeat,
            ExtensionType::Alpn,
            ExtensionType::SignedCertificateTimestamp,
            ExtensionType::ClientCertificateType,
            ExtensionType::ServerCertificateType,
            ExtensionType::Padding,
            ExtensionType::KeyShare,
            ExtensionType::PreSharedKey,
            ExtensionType::PskKeyExchangeModes,
            ExtensionType::EarlyData,
            ExtensionType::Cookie,
            ExtensionType::SupportedVersions,
            ExtensionType::CertificateAuthorities,
            ExtensionType::PostHandshakeAuth,
            ExtensionType::SignatureAlgorithmsCert,
        ],
        server_hello: &[
            ExtensionType::KeyShare,
            ExtensionType::PreSharedKey,
            ExtensionType::SupportedVersions,
        ],
        encrypted_extensions: &[
            ExtensionType::ServerName,
            ExtensionType::MaxFragmentLength,
            ExtensionType::SupportedGroups,
            ExtensionType::UseSrtp,
            ExtensionType::Heartbeat,
            ExtensionType::Alpn,
            ExtensionType::ClientCertificateType,
            ExtensionType::ServerCertificateType,
            ExtensionType::EarlyData,
        ],
    };

    pub fn allowed(&self, kind: MessageKind) -> &'static [ExtensionType] {
        match kind {
            MessageKind::ClientHello => self.client_hello,
            MessageKind::ServerHello => self.server_hello,
            MessageKind::EncryptedExtensions => self.encrypted_extensions,
        }
    }

    /// Whether `ty` may appear in `kind` under TLS 1.3.
    pub fn permits(&self, kind: MessageKind, ty: ExtensionType) -> bool {
        self.allowed(kind).contains(&ty)
    }
}

impl Default for Tls13Policy {
    fn default() -> Self {
        Self::RFC8446
    }
}
