use crate::alert::{Alert, AlertDescription};

/// Errors from the wire cursor and budgeted writer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("truncated input: need {need} bytes, {remaining} remaining")]
    Truncated { need: usize, remaining: usize },
    #[error("buffer full: need {need} bytes, {available} available")]
    BufferFull { need: usize, available: usize },
    #[error("length {len} does not fit a {max}-max length field")]
    LengthOverflow { len: usize, max: usize },
    #[error("unsupported length-prefix width: {0}")]
    BadLengthWidth(usize),
}

/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("invalid iv length")]
    InvalidIvLength,
    #[error("ciphertext not block-aligned")]
    NotBlockAligned,
    #[error("random source failed: {0}")]
    RandomFailure(String),
    #[error("unsupported named group 0x{0:04x}")]
    UnsupportedGroup(u16),
    #[error("invalid peer public key")]
    InvalidPublicKey,
    #[error("key derivation failed")]
    KdfFailure,
}

/// TLS protocol errors.
///
/// `Fatal` carries the alert the handshake layer must send. `BudgetExceeded`
/// is a local construction error and never becomes an alert.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("fatal alert {alert:?}: {reason}")]
    Fatal {
        alert: AlertDescription,
        reason: String,
    },
    #[error("extensions need {need} bytes but budget is {max}")]
    BudgetExceeded { need: usize, max: usize },
    #[error("internal error: {0}")]
    Internal(String),
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl TlsError {
    /// Shorthand for a fatal protocol error.
    pub fn fatal(alert: AlertDescription, reason: impl Into<String>) -> Self {
        TlsError::Fatal {
            alert,
            reason: reason.into(),
        }
    }

    /// The alert this error should produce, if any.
    pub fn alert(&self) -> Option<AlertDescription> {
        match self {
            TlsError::Fatal { alert, .. } => Some(*alert),
            TlsError::BudgetExceeded { .. } => None,
            TlsError::Internal(_) | TlsError::Crypto(_) => Some(AlertDescription::InternalError),
            TlsError::Wire(_) => Some(AlertDescription::DecodeError),
        }
    }

    /// The alert record to send before closing, if any.
    pub fn to_alert(&self) -> Option<Alert> {
        self.alert().map(Alert::fatal)
    }

    /// Whether this is a fatal protocol error carrying an alert.
    pub fn is_fatal(&self) -> bool {
        self.alert().is_some()
    }
}
