//! Static handler tables, chosen by role, message and version class.

use super::app_protocol::{
    alpn_client_handle, alpn_client_send, alpn_server_handle, npn_client_handle, npn_client_send,
    npn_server_handle,
};
use super::builtin::{
    groups, key_share, master_secret, padding, psk, renegotiation, server_name, session_ticket,
    versions,
};
use super::{ExtensionType, Handler, MessageKind, SenderFn};
use crate::{TlsRole, VersionClass};

/// A handler for one extension type.
#[derive(Clone, Copy)]
pub struct HandlerEntry {
    pub ext_type: ExtensionType,
    pub handler: Handler,
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HandlerEntry").field(&self.ext_type).finish()
    }
}

const fn entry(ext_type: ExtensionType, handler: Handler) -> HandlerEntry {
    HandlerEntry { ext_type, handler }
}

static SERVER_CH_SSL3: &[HandlerEntry] = &[entry(
    ExtensionType::RenegotiationInfo,
    renegotiation::server_handle,
)];

static SERVER_CH_TLS12: &[HandlerEntry] = &[
    entry(ExtensionType::ServerName, server_name::server_handle),
    entry(ExtensionType::SupportedGroups, groups::supported_groups_handle),
    entry(ExtensionType::EcPointFormats, groups::point_formats_server_handle),
    entry(ExtensionType::SignatureAlgorithms, groups::signature_algorithms_handle),
    entry(ExtensionType::Alpn, alpn_server_handle),
    entry(ExtensionType::Padding, padding::server_handle),
    entry(ExtensionType::ExtendedMasterSecret, master_secret::server_handle),
    entry(ExtensionType::SessionTicket, session_ticket::server_handle),
    entry(ExtensionType::NextProtocolNegotiation, npn_server_handle),
    entry(ExtensionType::RenegotiationInfo, renegotiation::server_handle),
];

static SERVER_CH_TLS13: &[HandlerEntry] = &[
    entry(ExtensionType::ServerName, server_name::server_handle),
    entry(ExtensionType::SupportedGroups, groups::supported_groups_handle),
    entry(ExtensionType::SignatureAlgorithms, groups::signature_algorithms_handle),
    entry(ExtensionType::Alpn, alpn_server_handle),
    entry(ExtensionType::Padding, padding::server_handle),
    entry(ExtensionType::KeyShare, key_share::server_handle),
    entry(ExtensionType::PreSharedKey, psk::server_handle),
    entry(ExtensionType::PskKeyExchangeModes, psk::modes_server_handle),
    entry(ExtensionType::SupportedVersions, versions::server_handle),
];

static CLIENT_SH_SSL3: &[HandlerEntry] = &[entry(
    ExtensionType::RenegotiationInfo,
    renegotiation::client_handle,
)];

static CLIENT_SH_TLS12: &[HandlerEntry] = &[
    entry(ExtensionType::ServerName, server_name::client_handle),
    entry(ExtensionType::EcPointFormats, groups::point_formats_client_handle),
    entry(ExtensionType::Alpn, alpn_client_handle),
    entry(ExtensionType::ExtendedMasterSecret, master_secret::client_handle),
    entry(ExtensionType::SessionTicket, session_ticket::client_handle),
    entry(ExtensionType::NextProtocolNegotiation, npn_client_handle),
    entry(ExtensionType::RenegotiationInfo, renegotiation::client_handle),
];

static CLIENT_SH_TLS13: &[HandlerEntry] = &[
    entry(ExtensionType::KeyShare, key_share::client_handle),
    entry(ExtensionType::PreSharedKey, psk::client_handle),
    entry(ExtensionType::SupportedVersions, versions::client_handle),
];

static CLIENT_EE_TLS13: &[HandlerEntry] = &[
    entry(ExtensionType::ServerName, server_name::client_handle),
    entry(ExtensionType::SupportedGroups, groups::supported_groups_handle),
    entry(ExtensionType::Alpn, alpn_client_handle),
];

/// ClientHello senders in emission order. pre_shared_key stays last.
static CLIENT_HELLO_SENDERS: &[(ExtensionType, SenderFn)] = &[
    (ExtensionType::ServerName, server_name::client_send),
    (ExtensionType::SupportedGroups, groups::supported_groups_send),
    (ExtensionType::EcPointFormats, groups::point_formats_send),
    (ExtensionType::SignatureAlgorithms, groups::signature_algorithms_send),
    (ExtensionType::Alpn, alpn_client_send),
    (ExtensionType::NextProtocolNegotiation, npn_client_send),
    (ExtensionType::SessionTicket, session_ticket::client_send),
    (ExtensionType::ExtendedMasterSecret, master_secret::client_send),
    (ExtensionType::RenegotiationInfo, renegotiation::client_send),
    (ExtensionType::SupportedVersions, versions::client_send),
    (ExtensionType::KeyShare, key_share::client_send),
    (ExtensionType::PskKeyExchangeModes, psk::modes_client_send),
    (ExtensionType::PreSharedKey, psk::client_send),
];

/// The table for receiving `kind` as `role` under `class`. Empty when the
/// role never receives that message.
pub fn handlers(role: TlsRole, kind: MessageKind, class: VersionClass) -> &'static [HandlerEntry] {
    match (role, kind, class) {
        (TlsRole::Server, MessageKind::ClientHello, VersionClass::Ssl3) => SERVER_CH_SSL3,
        (TlsRole::Server, MessageKind::ClientHello, VersionClass::Tls12) => SERVER_CH_TLS12,
        (TlsRole::Server, MessageKind::ClientHello, VersionClass::Tls13) => SERVER_CH_TLS13,
        (TlsRole::Client, MessageKind::ServerHello, VersionClass::Ssl3) => CLIENT_SH_SSL3,
        (TlsRole::Client, MessageKind::ServerHello, VersionClass::Tls12) => CLIENT_SH_TLS12,
        (TlsRole::Client, MessageKind::ServerHello, VersionClass::Tls13) => CLIENT_SH_TLS13,
        (TlsRole::Client, MessageKind::EncryptedExtensions, VersionClass::Tls13) => CLIENT_EE_TLS13,
        _ => &[],
    }
}

pub fn lookup(
    role: TlsRole,
    kind: MessageKind,
    class: VersionClass,
    ty: ExtensionType,
) -> Option<Handler> {
    handlers(role, kind, class)
        .iter()
        .find(|e| e.ext_type == ty)
        .map(|e| e.handler)
}

pub fn client_hello_senders() -> &'static [(ExtensionType, SenderFn)] {
    CLIENT_HELLO_SENDERS
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::extensions::Tls13Policy;

    const CLASSES: [VersionClass; 3] = [VersionClass::Ssl3, VersionClass::Tls12, VersionClass::Tls13];

    #[test]
    fn test_tables_have_unique_types() {
        for role in [TlsRole::Client, TlsRole::Server] {
            for kind in [
                MessageKind::ClientHello,
                MessageKind::ServerHello,
                MessageKind::EncryptedExtensions,
            ] {
                for class in CLASSES {
                    let table = handlers(role, kind, class);
                    let unique: HashSet<_> = table.iter().map(|e| e.ext_type).collect();
                    assert_eq!(unique.len(), table.len(), "{role:?} {kind:?} {class:?}");
                }
            }
        }
    }

    #[test]
    fn test_tls13_tables_within_policy() {
        let policy = Tls13Policy::RFC8446;
        for e in handlers(TlsRole::Server, MessageKind::ClientHello, VersionClass::Tls13) {
            assert!(policy.permits(MessageKind::ClientHello, e.ext_type), "{}", e.ext_type);
        }
        for e in handlers(TlsRole::Client, MessageKind::ServerHello, VersionClass::Tls13) {
            assert!(policy.permits(MessageKind::ServerHello, e.ext_type), "{}", e.ext_type);
        }
        for e in handlers(TlsRole::Client, MessageKind::EncryptedExtensions, VersionClass::Tls13) {
            assert!(
                policy.permits(MessageKind::EncryptedExtensions, e.ext_type),
                "{}",
                e.ext_type
            );
        }
    }

    #[test]
    fn test_role_mismatch_has_no_handlers() {
        assert!(handlers(TlsRole::Server, MessageKind::ServerHello, VersionClass::Tls12).is_empty());
        assert!(handlers(TlsRole::Client, MessageKind::ClientHello, VersionClass::Tls13).is_empty());
        assert!(
            handlers(TlsRole::Client, MessageKind::EncryptedExtensions, VersionClass::Tls12)
                .is_empty()
        );
    }

    #[test]
    fn test_ssl3_only_renegotiation_info() {
        assert!(lookup(
            TlsRole::Server,
            MessageKind::ClientHello,
            VersionClass::Ssl3,
            ExtensionType::RenegotiationInfo
        )
        .is_some());
        assert!(lookup(
            TlsRole::Server,
            MessageKind::ClientHello,
            VersionClass::Ssl3,
            ExtensionType::ServerName
        )
        .is_none());
    }

    #[test]
    fn test_psk_sender_is_last() {
        let senders = client_hello_senders();
        assert_eq!(senders.last().map(|s| s.0), Some(ExtensionType::PreSharedKey));
        let unique: HashSet<_> = senders.iter().map(|s| s.0).collect();
        assert_eq!(unique.len(), senders.len());
    }
}
