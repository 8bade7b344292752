//! AES-256-CBC, HMAC-SHA256 and PKCS#7 padding for the ticket envelope.
//!
//! Envelope MAC = HMAC-SHA256(mac_key, key_name || iv || len(ct)(2) || ct)

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;
use hext_types::CryptoError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::{Choice, ConstantTimeEq};

/// AES block size (16 bytes).
pub const AES_BLOCK_SIZE: usize = 16;

/// AES-256 key length.
pub const AES_KEY_LEN: usize = 32;

/// HMAC-SHA256 output length.
pub const MAC_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

fn aes256(key: &[u8]) -> Result<Aes256, CryptoError> {
    Aes256::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: AES_KEY_LEN,
        got: key.len(),
    })
}

fn check_cbc_args(iv: &[u8], data: &[u8]) -> Result<(), CryptoError> {
    if iv.len() != AES_BLOCK_SIZE {
        return Err(CryptoError::InvalidIvLength);
    }
    if data.len() % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::NotBlockAligned);
    }
    Ok(())
}

/// AES-256-CBC encrypt in-place (data must be block-aligned).
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), CryptoError> {
    check_cbc_args(iv, data)?;
    let cipher = aes256(key)?;
    let mut prev = [0u8; AES_BLOCK_SIZE];
    prev.copy_from_slice(iv);

    for chunk in data.chunks_mut(AES_BLOCK_SIZE) {
        for (b, p) in chunk.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
        prev.copy_from_slice(chunk);
    }
    Ok(())
}

/// AES-256-CBC decrypt in-place (no padding removal).
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), CryptoError> {
    check_cbc_args(iv, data)?;
    let cipher = aes256(key)?;
    let mut prev = [0u8; AES_BLOCK_SIZE];
    prev.copy_from_slice(iv);

    for chunk in data.chunks_mut(AES_BLOCK_SIZE) {
        let mut ct_copy = [0u8; AES_BLOCK_SIZE];
        ct_copy.copy_from_slice(chunk);
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
        for (b, p) in chunk.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        prev = ct_copy;
    }
    Ok(())
}

/// HMAC-SHA256 over the concatenation of `parts`.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<[u8; MAC_LEN], CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: MAC_LEN,
            got: key.len(),
        }
    })?;
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Constant-time equality of two MACs.
pub fn mac_eq(a: &[u8], b: &[u8]) -> Choice {
    a.ct_eq(b)
}

/// Append PKCS#7 padding up to the next block boundary (always 1..=16 bytes).
pub fn pkcs7_pad(data: &mut Vec<u8>) {
    let pad = AES_BLOCK_SIZE - (data.len() % AES_BLOCK_SIZE);
    data.resize(data.len() + pad, pad as u8);
}

/// Validate PKCS#7 padding and return the unpadded length.
///
/// The last block is inspected in full regardless of the declared pad
/// length, so the work done does not depend on where the padding is bad.
pub fn pkcs7_unpadded_len(data: &[u8]) -> Option<usize> {
    if data.is_empty() || data.len() % AES_BLOCK_SIZE != 0 {
        return None;
    }
    let pad = data[data.len() - 1] as usize;
    let mut ok = Choice::from(((pad >= 1) & (pad <= AES_BLOCK_SIZE)) as u8);
    for i in 0..AES_BLOCK_SIZE {
        let b = data[data.len() - 1 - i];
        let in_pad = Choice::from((i < pad) as u8);
        ok &= !in_pad | b.ct_eq(&(pad as u8));
    }
    if bool::from(ok) {
        Some(data.len() - pad)
    } else {
        None
    }
}
