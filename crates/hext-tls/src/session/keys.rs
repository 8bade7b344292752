//! Process-wide session-ticket keys.

use std::fmt;
use std::sync::Arc;

use hext_types::CryptoError;
use hkdf::Hkdf;
use once_cell::sync::OnceCell;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length of the key name carried in every ticket.
pub const KEY_NAME_LEN: usize = 16;

/// Fixed prefix of every key name; the remaining 12 bytes identify the key.
pub const KEY_NAME_PREFIX: &[u8; 4] = b"HXT!";

const HKDF_SALT: &[u8] = b"hext session ticket keys v1";

/// Key material protecting session tickets.
///
/// Immutable once built. Share it between connections through `Arc`.
pub struct SessionTicketKeys {
    key_name: [u8; KEY_NAME_LEN],
    aes_key: Zeroizing<[u8; 32]>,
    mac_key: Zeroizing<[u8; 32]>,
}

impl SessionTicketKeys {
    /// Fresh random keys.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut suffix = [0u8; KEY_NAME_LEN - KEY_NAME_PREFIX.len()];
        let mut aes_key = Zeroizing::new([0u8; 32]);
        let mut mac_key = Zeroizing::new([0u8; 32]);
        for buf in [&mut suffix[..], &mut aes_key[..], &mut mac_key[..]] {
            getrandom::getrandom(buf).map_err(|e| CryptoError::RandomFailure(e.to_string()))?;
        }
        Ok(Self::assemble(&suffix, aes_key, mac_key))
    }

    /// Keys derived with HKDF-SHA256 from the server's long-term private key.
    ///
    /// Every process holding the same server key derives the same ticket keys.
    pub fn derive(server_key: &[u8]) -> Result<Self, CryptoError> {
        if server_key.is_empty() {
            return Err(CryptoError::KdfFailure);
        }
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), server_key);
        let mut suffix = [0u8; KEY_NAME_LEN - KEY_NAME_PREFIX.len()];
        let mut aes_key = Zeroizing::new([0u8; 32]);
        let mut mac_key = Zeroizing::new([0u8; 32]);
        hk.expand(b"key name", &mut suffix)
            .map_err(|_| CryptoError::KdfFailure)?;
        hk.expand(b"aes key", &mut aes_key[..])
            .map_err(|_| CryptoError::KdfFailure)?;
        hk.expand(b"mac key", &mut mac_key[..])
            .map_err(|_| CryptoError::KdfFailure)?;
        Ok(Self::assemble(&suffix, aes_key, mac_key))
    }

    /// Keys from explicit material.
    pub fn from_parts(key_name: [u8; KEY_NAME_LEN], aes_key: [u8; 32], mac_key: [u8; 32]) -> Self {
        Self {
            key_name,
            aes_key: Zeroizing::new(aes_key),
            mac_key: Zeroizing::new(mac_key),
        }
    }

    fn assemble(
        suffix: &[u8],
        aes_key: Zeroizing<[u8; 32]>,
        mac_key: Zeroizing<[u8; 32]>,
    ) -> Self {
        let mut key_name = [0u8; KEY_NAME_LEN];
        key_name[..KEY_NAME_PREFIX.len()].copy_from_slice(KEY_NAME_PREFIX);
        key_name[KEY_NAME_PREFIX.len()..].copy_from_slice(suffix);
        Self {
            key_name,
            aes_key,
            mac_key,
        }
    }

    pub fn key_name(&self) -> &[u8; KEY_NAME_LEN] {
        &self.key_name
    }

    pub(crate) fn aes_key(&self) -> &[u8] {
        &self.aes_key[..]
    }

    pub(crate) fn mac_key(&self) -> &[u8] {
        &self.mac_key[..]
    }
}

impl fmt::Debug for SessionTicketKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTicketKeys")
            .field("key_name", &hext_utils::hex::encode(&self.key_name))
            .finish_non_exhaustive()
    }
}

static GLOBAL_KEYS: OnceCell<Arc<SessionTicketKeys>> = OnceCell::new();

/// The process-wide ticket keys, derived from `server_key` on first use.
///
/// Later calls return the same keys whatever key they pass. Concurrent first
/// callers block until the single initializer finishes.
pub fn global(server_key: &[u8]) -> Result<&'static Arc<SessionTicketKeys>, CryptoError> {
    GLOBAL_KEYS.get_or_try_init(|| {
        let keys = SessionTicketKeys::derive(server_key)?;
        tracing::debug!(
            key_name = %hext_utils::hex::encode(keys.key_name()),
            "initialized session ticket keys"
        );
        Ok(Arc::new(keys))
    })
}
