//! Per-handshake extension bookkeeping.

use std::collections::BTreeSet;
use std::fmt;

use crate::extensions::{ExtensionType, MessageKind, SenderFn, Tls13Policy};
use crate::ProtocolVersion;

/// Which extensions have been seen, sent and queued for reply in one
/// handshake attempt. Replaced wholesale on renegotiation.
#[derive(Default)]
pub struct NegotiationState {
    negotiated: BTreeSet<ExtensionType>,
    advertised: BTreeSet<ExtensionType>,
    pending_senders: Vec<(ExtensionType, SenderFn)>,
}

impl NegotiationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a handler for `ty` ran to completion.
    pub fn is_negotiated(&self, ty: ExtensionType) -> bool {
        self.negotiated.contains(&ty)
    }

    pub fn negotiated(&self) -> &BTreeSet<ExtensionType> {
        &self.negotiated
    }

    pub(crate) fn mark_negotiated(&mut self, ty: ExtensionType) {
        self.negotiated.insert(ty);
    }

    /// Whether this client sent `ty` in its ClientHello.
    pub fn is_advertised(&self, ty: ExtensionType) -> bool {
        self.advertised.contains(&ty)
    }

    pub fn advertised(&self) -> &BTreeSet<ExtensionType> {
        &self.advertised
    }

    pub(crate) fn record_advertised(&mut self, types: impl IntoIterator<Item = ExtensionType>) {
        self.advertised.extend(types);
    }

    /// Queue a reply sender. A second registration for the same type is
    /// dropped.
    pub(crate) fn register_sender(&mut self, ty: ExtensionType, sender: SenderFn) {
        if self.pending_senders.iter().all(|(t, _)| *t != ty) {
            self.pending_senders.push((ty, sender));
        }
    }

    pub fn pending_types(&self) -> impl Iterator<Item = ExtensionType> + '_ {
        self.pending_senders.iter().map(|(t, _)| *t)
    }

    /// Remove and return the queued senders that belong in `kind`.
    ///
    /// Before TLS 1.3 every reply goes in the ServerHello. Under TLS 1.3 a
    /// sender belongs to the message whose allow-list names its type.
    pub(crate) fn take_reply_senders(
        &mut self,
        kind: MessageKind,
        version: ProtocolVersion,
        policy: &Tls13Policy,
    ) -> Vec<(ExtensionType, SenderFn)> {
        let belongs = |ty: ExtensionType| {
            if version.is_tls13() {
                policy.permits(kind, ty)
            } else {
                kind == MessageKind::ServerHello
            }
        };
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_senders)
            .into_iter()
            .partition(|(ty, _)| belongs(*ty));
        self.pending_senders = kept;
        taken
    }
}

impl fmt::Debug for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationState")
            .field("negotiated", &self.negotiated)
            .field("advertised", &self.advertised)
            .field("pending", &self.pending_types().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::{Emission, SendResult};
    use crate::handshake::context::HandshakeContext;

    fn empty_sender(_: &HandshakeContext) -> SendResult<'_> {
        Ok(Some(Emission::empty()))
    }

    #[test]
    fn test_register_sender_dedupes() {
        let mut st = NegotiationState::new();
        st.register_sender(ExtensionType::ServerName, empty_sender);
        st.register_sender(ExtensionType::ServerName, empty_sender);
        st.register_sender(ExtensionType::Alpn, empty_sender);
        assert_eq!(
            st.pending_types().collect::<Vec<_>>(),
            vec![ExtensionType::ServerName, ExtensionType::Alpn]
        );
    }

    #[test]
    fn test_take_reply_senders_tls12_all_in_server_hello() {
        let mut st = NegotiationState::new();
        st.register_sender(ExtensionType::ServerName, empty_sender);
        st.register_sender(ExtensionType::SessionTicket, empty_sender);
        let p = Tls13Policy::RFC8446;
        assert!(st
            .take_reply_senders(MessageKind::EncryptedExtensions, ProtocolVersion::TLS12, &p)
            .is_empty());
        let sh = st.take_reply_senders(MessageKind::ServerHello, ProtocolVersion::TLS12, &p);
        assert_eq!(sh.len(), 2);
        assert_eq!(st.pending_types().count(), 0);
    }

    #[test]
    fn test_take_reply_senders_tls13_split() {
        let mut st = NegotiationState::new();
        st.register_sender(ExtensionType::ServerName, empty_sender);
        st.register_sender(ExtensionType::KeyShare, empty_sender);
        st.register_sender(ExtensionType::Alpn, empty_sender);
        st.register_sender(ExtensionType::SupportedVersions, empty_sender);
        let p = Tls13Policy::RFC8446;
        let sh = st.take_reply_senders(MessageKind::ServerHello, ProtocolVersion::TLS13, &p);
        let sh: Vec<_> = sh.into_iter().map(|(t, _)| t).collect();
        assert_eq!(sh, vec![ExtensionType::KeyShare, ExtensionType::SupportedVersions]);
        let ee = st.take_reply_senders(MessageKind::EncryptedExtensions, ProtocolVersion::TLS13, &p);
        let ee: Vec<_> = ee.into_iter().map(|(t, _)| t).collect();
        assert_eq!(ee, vec![ExtensionType::ServerName, ExtensionType::Alpn]);
    }

    #[test]
    fn test_negotiated_and_advertised_sets() {
        let mut st = NegotiationState::new();
        st.mark_negotiated(ExtensionType::Alpn);
        st.record_advertised([ExtensionType::KeyShare, ExtensionType::Alpn]);
        assert!(st.is_negotiated(ExtensionType::Alpn));
        assert!(!st.is_negotiated(ExtensionType::KeyShare));
        assert!(st.is_advertised(ExtensionType::KeyShare));
        assert!(format!("{st:?}").contains("negotiated"));
    }
}
