#![no_main]
use std::sync::Arc;

use hext_tls::config::TlsConfig;
use hext_tls::extensions::MessageKind;
use hext_tls::handshake::HandshakeContext;
use hext_tls::{ProtocolVersion, TlsRole};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the negotiated version
    let Some((&selector, blob)) = data.split_first() else {
        return;
    };
    let version = if selector & 1 == 0 {
        ProtocolVersion::TLS12
    } else {
        ProtocolVersion::TLS13
    };
    let config = TlsConfig::builder()
        .role(TlsRole::Server)
        .alpn(&[b"h2", b"http/1.1"])
        .build();
    let mut ctx = HandshakeContext::new(Arc::new(config)).with_time(1_700_000_000);
    let _ = ctx.pre_negotiate_version(version, blob);
    if ctx.dispatch(MessageKind::ClientHello, blob).is_ok() {
        let mut out = Vec::new();
        let _ = ctx.build_reply_extensions(MessageKind::ServerHello, &mut out);
        let _ = ctx.build_reply_extensions(MessageKind::EncryptedExtensions, &mut out);
    }
});
