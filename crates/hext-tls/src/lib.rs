#![forbid(unsafe_code)]
#![doc = "TLS hello-extension negotiation and session-ticket resumption engine."]

pub mod config;
pub mod crypt;
pub mod extensions;
pub mod handshake;
pub mod session;

pub use hext_types::{
    Alert, AlertDescription, AlertLevel, ProtocolVersion, TlsError, VersionClass, WireError,
};

/// TLS cipher suite identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite(pub u16);

impl CipherSuite {
    // TLS 1.3 cipher suites
    pub const TLS_AES_128_GCM_SHA256: Self = Self(0x1301);
    pub const TLS_AES_256_GCM_SHA384: Self = Self(0x1302);
    pub const TLS_CHACHA20_POLY1305_SHA256: Self = Self(0x1303);

    // TLS 1.2 cipher suites (representative)
    pub const TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0xC02F);
    pub const TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384: Self = Self(0xC030);
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256: Self = Self(0xC02B);
    pub const TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384: Self = Self(0xC02C);
    pub const TLS_RSA_WITH_AES_128_CBC_SHA: Self = Self(0x002F);
}

/// The role of a TLS endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsRole {
    Client,
    Server,
}
