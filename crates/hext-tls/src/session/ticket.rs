//! Session-ticket envelope and plaintext schema.
//!
//! Envelope: `key_name(16) || iv(16) || encrypted_state(u16 len) || mac(32)`.
//! `encrypted_state` is AES-256-CBC over the PKCS#7-padded [`SessionState`].

use std::fmt;

use hext_types::{CryptoError, ProtocolVersion, WireError};
use hext_utils::wire::{Reader, Writer};
use zeroize::Zeroizing;

use super::keys::{SessionTicketKeys, KEY_NAME_LEN};
use crate::crypt::ticket_cipher::{
    aes_cbc_decrypt, aes_cbc_encrypt, hmac_sha256, mac_eq, pkcs7_pad, pkcs7_unpadded_len,
    AES_BLOCK_SIZE, MAC_LEN,
};
use crate::CipherSuite;

/// Version tag written at the start of every plaintext.
pub const TICKET_FORMAT_VERSION: u16 = 0x0101;

/// Largest master secret a ticket may carry.
pub const MAX_MASTER_SECRET_LEN: usize = 48;

const CLIENT_AUTH_ANONYMOUS: u8 = 0;
const CLIENT_AUTH_CERTIFICATE: u8 = 1;
const SERVER_NAME_ABSENT: u8 = 0;
const SERVER_NAME_PRESENT: u8 = 1;

/// Why a ticket was not accepted. Never fatal to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TicketError {
    #[error("malformed ticket envelope")]
    Malformed,
    #[error("unknown key name")]
    UnknownKeyName,
    #[error("mac mismatch")]
    BadMac,
    #[error("bad padding")]
    BadPadding,
    #[error("inconsistent session state")]
    BadState,
    #[error("ticket expired")]
    Expired,
}

impl From<WireError> for TicketError {
    fn from(_: WireError) -> Self {
        TicketError::BadState
    }
}

/// Algorithm id and key size, as recorded for auth and key exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyInfo {
    pub algorithm: u8,
    pub key_bits: u32,
}

/// The session's master secret, either raw or wrapped by an external key.
#[derive(Clone, PartialEq, Eq)]
pub enum MasterSecret {
    Raw(Zeroizing<Vec<u8>>),
    Wrapped {
        exchange_key_type: u8,
        wrap_mechanism: u32,
        wrapped: Zeroizing<Vec<u8>>,
    },
}

impl MasterSecret {
    pub fn raw(secret: &[u8]) -> Self {
        MasterSecret::Raw(Zeroizing::new(secret.to_vec()))
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            MasterSecret::Raw(s) => &s[..],
            MasterSecret::Wrapped { wrapped, .. } => &wrapped[..],
        }
    }

    pub fn is_wrapped(&self) -> bool {
        matches!(self, MasterSecret::Wrapped { .. })
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterSecret::Raw(s) => write!(f, "Raw([{} bytes])", s.len()),
            MasterSecret::Wrapped {
                exchange_key_type,
                wrap_mechanism,
                wrapped,
            } => f
                .debug_struct("Wrapped")
                .field("exchange_key_type", exchange_key_type)
                .field("wrap_mechanism", wrap_mechanism)
                .field("len", &wrapped.len())
                .finish(),
        }
    }
}

/// How the client authenticated in the original handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIdentity {
    Anonymous,
    /// DER certificate of the client.
    Certificate(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerNameEntry {
    pub name_type: u8,
    pub host: Vec<u8>,
}

/// Everything a ticket remembers about a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub version: ProtocolVersion,
    pub cipher_suite: CipherSuite,
    pub compression: u8,
    pub auth: KeyInfo,
    pub key_exchange: KeyInfo,
    pub master_secret: MasterSecret,
    pub client_identity: ClientIdentity,
    /// Issue time in seconds.
    pub timestamp: u32,
    pub server_name: Option<ServerNameEntry>,
    pub extended_master_secret: bool,
}

impl SessionState {
    /// A state with a raw master secret and no client auth.
    pub fn new(
        version: ProtocolVersion,
        cipher_suite: CipherSuite,
        master_secret: &[u8],
        timestamp: u32,
    ) -> Self {
        Self {
            version,
            cipher_suite,
            compression: 0,
            auth: KeyInfo::default(),
            key_exchange: KeyInfo::default(),
            master_secret: MasterSecret::raw(master_secret),
            client_identity: ClientIdentity::Anonymous,
            timestamp,
            server_name: None,
            extended_master_secret: false,
        }
    }

    fn encode(&self, w: &mut Writer<'_>) -> Result<(), WireError> {
        w.append_u16(TICKET_FORMAT_VERSION)?;
        w.append_u16(self.version.0)?;
        w.append_u16(self.cipher_suite.0)?;
        w.append_u8(self.compression)?;
        w.append_u8(self.auth.algorithm)?;
        w.append_u32(self.auth.key_bits)?;
        w.append_u8(self.key_exchange.algorithm)?;
        w.append_u32(self.key_exchange.key_bits)?;
        match &self.master_secret {
            MasterSecret::Raw(ms) => {
                w.append_u8(0)?;
                w.append_u8(0)?;
                w.append_u32(0)?;
                w.append_var(ms, 2)?;
            }
            MasterSecret::Wrapped {
                exchange_key_type,
                wrap_mechanism,
                wrapped,
            } => {
                w.append_u8(1)?;
                w.append_u8(*exchange_key_type)?;
                w.append_u32(*wrap_mechanism)?;
                w.append_var(wrapped, 2)?;
            }
        }
        match &self.client_identity {
            ClientIdentity::Anonymous => w.append_u8(CLIENT_AUTH_ANONYMOUS)?,
            ClientIdentity::Certificate(der) => {
                w.append_u8(CLIENT_AUTH_CERTIFICATE)?;
                w.append_var(der, 3)?;
            }
        }
        w.append_u32(self.timestamp)?;
        match &self.server_name {
            None => w.append_u8(SERVER_NAME_ABSENT)?,
            Some(sn) => {
                w.append_u8(SERVER_NAME_PRESENT)?;
                w.append_u8(sn.name_type)?;
                w.append_var(&sn.host, 2)?;
            }
        }
        w.append_u8(u8::from(self.extended_master_secret))
    }

    /// Decode a plaintext with padding already removed. The whole input
    /// must be consumed.
    fn decode(data: &[u8]) -> Result<Self, TicketError> {
        let mut r = Reader::new(data);
        let state = Self::read(&mut r)?;
        if !r.is_empty() {
            return Err(TicketError::BadState);
        }
        Ok(state)
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, TicketError> {
        if r.read_u16()? != TICKET_FORMAT_VERSION {
            return Err(TicketError::BadState);
        }
        let version = ProtocolVersion(r.read_u16()?);
        let cipher_suite = CipherSuite(r.read_u16()?);
        let compression = r.read_u8()?;
        let auth = KeyInfo {
            algorithm: r.read_u8()?,
            key_bits: r.read_u32()?,
        };
        let key_exchange = KeyInfo {
            algorithm: r.read_u8()?,
            key_bits: r.read_u32()?,
        };
        let is_wrapped = r.read_u8()?;
        let exchange_key_type = r.read_u8()?;
        let wrap_mechanism = r.read_u32()?;
        let ms = r.read_var(2)?;
        if ms.len() > MAX_MASTER_SECRET_LEN {
            return Err(TicketError::BadState);
        }
        let master_secret = match is_wrapped {
            0 => MasterSecret::raw(ms),
            1 => MasterSecret::Wrapped {
                exchange_key_type,
                wrap_mechanism,
                wrapped: Zeroizing::new(ms.to_vec()),
            },
            _ => return Err(TicketError::BadState),
        };
        let client_identity = match r.read_u8()? {
            CLIENT_AUTH_ANONYMOUS => ClientIdentity::Anonymous,
            CLIENT_AUTH_CERTIFICATE => ClientIdentity::Certificate(r.read_var(3)?.to_vec()),
            _ => return Err(TicketError::BadState),
        };
        let timestamp = r.read_u32()?;
        let server_name = match r.read_u8()? {
            SERVER_NAME_ABSENT => None,
            SERVER_NAME_PRESENT => Some(ServerNameEntry {
                name_type: r.read_u8()?,
                host: r.read_var(2)?.to_vec(),
            }),
            _ => return Err(TicketError::BadState),
        };
        let extended_master_secret = match r.read_u8()? {
            0 => false,
            1 => true,
            _ => return Err(TicketError::BadState),
        };
        Ok(Self {
            version,
            cipher_suite,
            compression,
            auth,
            key_exchange,
            master_secret,
            client_identity,
            timestamp,
            server_name,
            extended_master_secret,
        })
    }
}

/// A session recovered from a valid, unexpired ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumedSession {
    pub version: ProtocolVersion,
    pub cipher_suite: CipherSuite,
    /// Still wrapped if the ticket carried a wrapped secret.
    pub master_secret: MasterSecret,
    pub peer_certificate: Option<Vec<u8>>,
    pub server_name: Option<ServerNameEntry>,
    pub extended_master_secret: bool,
    pub issued_at: u32,
    pub resumable: bool,
}

impl From<SessionState> for ResumedSession {
    fn from(s: SessionState) -> Self {
        let peer_certificate = match s.client_identity {
            ClientIdentity::Anonymous => None,
            ClientIdentity::Certificate(der) => Some(der),
        };
        Self {
            version: s.version,
            cipher_suite: s.cipher_suite,
            master_secret: s.master_secret,
            peer_certificate,
            server_name: s.server_name,
            extended_master_secret: s.extended_master_secret,
            issued_at: s.timestamp,
            resumable: true,
        }
    }
}

fn ticket_mac(
    keys: &SessionTicketKeys,
    key_name: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<[u8; MAC_LEN], CryptoError> {
    let len = (ciphertext.len() as u16).to_be_bytes();
    hmac_sha256(keys.mac_key(), &[key_name, iv, &len, ciphertext])
}

/// Seal `state` into an opaque ticket under `keys`.
pub fn issue_ticket(keys: &SessionTicketKeys, state: &SessionState) -> Result<Vec<u8>, crate::TlsError> {
    if state.master_secret.bytes().len() > MAX_MASTER_SECRET_LEN {
        return Err(crate::TlsError::Internal(format!(
            "master secret of {} bytes does not fit a ticket",
            state.master_secret.bytes().len()
        )));
    }
    let mut plaintext = Zeroizing::new(Vec::with_capacity(128));
    state.encode(&mut Writer::unbounded(&mut plaintext))?;
    pkcs7_pad(&mut plaintext);

    let mut iv = [0u8; AES_BLOCK_SIZE];
    getrandom::getrandom(&mut iv).map_err(|e| CryptoError::RandomFailure(e.to_string()))?;
    let mut ciphertext = plaintext.to_vec();
    aes_cbc_encrypt(keys.aes_key(), &iv, &mut ciphertext)?;
    let mac = ticket_mac(keys, keys.key_name(), &iv, &ciphertext)?;

    let mut ticket = Vec::with_capacity(KEY_NAME_LEN + AES_BLOCK_SIZE + 2 + ciphertext.len() + MAC_LEN);
    let mut w = Writer::unbounded(&mut ticket);
    w.append_bytes(keys.key_name())?;
    w.append_bytes(&iv)?;
    w.append_var(&ciphertext, 2)?;
    w.append_bytes(&mac)?;
    Ok(ticket)
}

struct Envelope<'a> {
    key_name: &'a [u8],
    iv: &'a [u8],
    ciphertext: &'a [u8],
    mac: &'a [u8],
}

impl<'a> Envelope<'a> {
    fn parse(ticket: &'a [u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(ticket);
        let env = Envelope {
            key_name: r.read_bytes(KEY_NAME_LEN)?,
            iv: r.read_bytes(AES_BLOCK_SIZE)?,
            ciphertext: r.read_var(2)?,
            mac: r.read_bytes(MAC_LEN)?,
        };
        if !r.is_empty() {
            return Err(WireError::LengthOverflow {
                len: ticket.len(),
                max: r.position(),
            });
        }
        Ok(env)
    }
}

/// Authenticate and open a ticket. Does not check expiry.
///
/// The MAC is computed and both the key name and MAC are compared before
/// either result is acted on.
pub fn decrypt_ticket(keys: &SessionTicketKeys, ticket: &[u8]) -> Result<SessionState, TicketError> {
    let env = Envelope::parse(ticket).map_err(|_| TicketError::Malformed)?;
    if env.ciphertext.is_empty() || env.ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(TicketError::Malformed);
    }

    let expected = ticket_mac(keys, env.key_name, env.iv, env.ciphertext)
        .map_err(|_| TicketError::BadMac)?;
    let name_ok = mac_eq(env.key_name, keys.key_name());
    let mac_ok = mac_eq(env.mac, &expected);
    if !bool::from(name_ok) {
        return Err(TicketError::UnknownKeyName);
    }
    if !bool::from(mac_ok) {
        return Err(TicketError::BadMac);
    }

    let mut plaintext = Zeroizing::new(env.ciphertext.to_vec());
    aes_cbc_decrypt(keys.aes_key(), env.iv, &mut plaintext).map_err(|_| TicketError::BadPadding)?;
    let len = pkcs7_unpadded_len(&plaintext).ok_or(TicketError::BadPadding)?;
    SessionState::decode(&plaintext[..len])
}

/// Decide whether `ticket` resumes a session at time `now`.
///
/// Every failure is soft: the caller proceeds with a full handshake.
pub fn process_ticket(
    keys: &SessionTicketKeys,
    ticket: &[u8],
    lifetime_hint: u32,
    now: u32,
) -> Option<ResumedSession> {
    let outcome = decrypt_ticket(keys, ticket).and_then(|state| {
        if u64::from(state.timestamp) + u64::from(lifetime_hint) <= u64::from(now) {
            Err(TicketError::Expired)
        } else {
            Ok(state)
        }
    });
    match outcome {
        Ok(state) => {
            tracing::debug!(
                cipher_suite = state.cipher_suite.0,
                age = now.saturating_sub(state.timestamp),
                "session ticket accepted"
            );
            Some(state.into())
        }
        Err(reason) => {
            tracing::debug!(%reason, ticket_len = ticket.len(), "session ticket rejected");
            None
        }
    }
}

/// A NewSessionTicket handshake body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionTicket {
    pub lifetime_hint: u32,
    pub ticket: Vec<u8>,
}

/// `ticket_lifetime_hint(4) || ticket(u16 len)`.
pub fn encode_new_session_ticket(lifetime_hint: u32, ticket: &[u8]) -> Result<Vec<u8>, WireError> {
    let mut body = Vec::with_capacity(6 + ticket.len());
    let mut w = Writer::unbounded(&mut body);
    w.append_u32(lifetime_hint)?;
    w.append_var(ticket, 2)?;
    Ok(body)
}

pub fn decode_new_session_ticket(body: &[u8]) -> Result<NewSessionTicket, crate::TlsError> {
    let mut r = Reader::new(body);
    let lifetime_hint = r.read_u32()?;
    let ticket = r.read_var(2)?.to_vec();
    if !r.is_empty() {
        return Err(crate::TlsError::fatal(
            crate::AlertDescription::DecodeError,
            "trailing bytes after NewSessionTicket",
        ));
    }
    Ok(NewSessionTicket {
        lifetime_hint,
        ticket,
    })
}
