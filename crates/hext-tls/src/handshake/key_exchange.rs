//! TLS 1.3 ephemeral key exchange (X25519).

use hext_types::CryptoError;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::crypt::NamedGroup;

/// Inner key exchange state (variant per named group).
enum KeyExchangeInner {
    X25519(StaticSecret),
}

/// Ephemeral key exchange state for one handshake.
pub struct KeyExchange {
    group: NamedGroup,
    inner: KeyExchangeInner,
    public_key_bytes: Vec<u8>,
}

impl KeyExchange {
    /// Generate a new ephemeral keypair for the given named group.
    pub fn generate(group: NamedGroup) -> Result<Self, CryptoError> {
        match group {
            NamedGroup::X25519 => {
                let mut seed = Zeroizing::new([0u8; 32]);
                getrandom::getrandom(&mut seed[..])
                    .map_err(|e| CryptoError::RandomFailure(e.to_string()))?;
                let secret = StaticSecret::from(*seed);
                let public_key_bytes = PublicKey::from(&secret).as_bytes().to_vec();
                Ok(Self {
                    group,
                    inner: KeyExchangeInner::X25519(secret),
                    public_key_bytes,
                })
            }
            other => Err(CryptoError::UnsupportedGroup(other.0)),
        }
    }

    /// Whether [`generate`](Self::generate) accepts `group`.
    pub fn supports(group: NamedGroup) -> bool {
        group == NamedGroup::X25519
    }

    pub fn group(&self) -> NamedGroup {
        self.group
    }

    /// The public key bytes to include in the key_share extension.
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key_bytes
    }

    /// Compute the shared secret from the peer's public key.
    ///
    /// Rejects peer keys of the wrong length and low-order points.
    pub fn compute_shared_secret(&self, peer_public: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        match &self.inner {
            KeyExchangeInner::X25519(secret) => {
                let peer: [u8; 32] = peer_public
                    .try_into()
                    .map_err(|_| CryptoError::InvalidPublicKey)?;
                let shared = secret.diffie_hellman(&PublicKey::from(peer));
                if !shared.was_contributory() {
                    return Err(CryptoError::InvalidPublicKey);
                }
                Ok(Zeroizing::new(shared.as_bytes().to_vec()))
            }
        }
    }
}

impl std::fmt::Debug for KeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyExchange")
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}
