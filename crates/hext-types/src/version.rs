//! Protocol version identifiers.

/// A TLS/SSL protocol version as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    pub const SSL3: Self = Self(0x0300);
    pub const TLS10: Self = Self(0x0301);
    pub const TLS11: Self = Self(0x0302);
    pub const TLS12: Self = Self(0x0303);
    pub const TLS13: Self = Self(0x0304);

    /// Whether this version uses the TLS 1.3 extension rules.
    pub fn is_tls13(self) -> bool {
        self >= Self::TLS13
    }
}

/// The coarse class used to select extension handler tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionClass {
    Ssl3,
    Tls12,
    Tls13,
}

impl From<ProtocolVersion> for VersionClass {
    fn from(v: ProtocolVersion) -> Self {
        if v <= ProtocolVersion::SSL3 {
            VersionClass::Ssl3
        } else if v.is_tls13() {
            VersionClass::Tls13
        } else {
            VersionClass::Tls12
        }
    }
}
