//! AES-256-GCM envelope encryption
//!
//! Encrypted objects are stored as base64 text with the layout
//!
//! ```text
//! +--------+-----------+----------------+----------+
//! | len(1) | iv (len)  | ciphertext (n) | tag (16) |
//! +--------+-----------+----------------+----------+
//! ```
//!
//! The IV length is written in the first byte, so a reader recovers it from
//! the blob alone. Every call to [`AesGcmEnvelope::encrypt`] draws a fresh IV
//! from the OS random source.

use crate::{
    keys::EnvelopeKey,
    CryptoError, Result,
};
use aes_gcm::{
    aead::{
        consts::{U12, U16, U24, U32, U48, U64, U8},
        generic_array::{ArrayLength, GenericArray},
        Aead, KeyInit,
    },
    aes::Aes256,
    AesGcm,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};

/// Default IV length in bytes (the GCM recommended nonce size)
pub const DEFAULT_IV_LENGTH: usize = 12;

/// Authentication tag length in bytes
pub const TAG_LENGTH: usize = 16;

/// IV lengths accepted on both the encrypt and decrypt side
pub const SUPPORTED_IV_LENGTHS: [usize; 7] = [8, 12, 16, 24, 32, 48, 64];

// Dispatch a runtime IV length to the matching GCM nonce size.
macro_rules! with_iv_size {
    ($len:expr, $func:ident ( $($arg:expr),* )) => {
        match $len {
            8 => $func::<U8>($($arg),*),
            12 => $func::<U12>($($arg),*),
            16 => $func::<U16>($($arg),*),
            24 => $func::<U24>($($arg),*),
            32 => $func::<U32>($($arg),*),
            48 => $func::<U48>($($arg),*),
            64 => $func::<U64>($($arg),*),
            other => Err(CryptoError::InvalidNonce(format!(
                "unsupported IV length {}",
                other
            ))),
        }
    };
}

/// Symmetric authenticated encryption with a self-describing wire format
#[derive(Clone, Debug)]
pub struct AesGcmEnvelope {
    key: EnvelopeKey,
    iv_length: usize,
}

impl AesGcmEnvelope {
    /// Create an envelope from an unhashed secret, using 12-byte IVs
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: EnvelopeKey::derive(secret),
            iv_length: DEFAULT_IV_LENGTH,
        }
    }

    /// Use a different IV length for encryption
    pub fn with_iv_length(mut self, iv_length: usize) -> Result<Self> {
        if !SUPPORTED_IV_LENGTHS.contains(&iv_length) {
            return Err(CryptoError::InvalidNonce(format!(
                "unsupported IV length {}",
                iv_length
            )));
        }
        self.iv_length = iv_length;
        Ok(self)
    }

    /// IV length used for encryption
    pub fn iv_length(&self) -> usize {
        self.iv_length
    }

    /// Encrypt bytes and return the base64-encoded frame
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let mut iv = vec![0u8; self.iv_length];
        OsRng.fill_bytes(&mut iv);
        let framed = self.seal_with_iv(&iv, plaintext)?;
        Ok(STANDARD.encode(framed))
    }

    /// Decrypt a base64-encoded frame
    ///
    /// Fails with [`CryptoError::Decryption`] if the tag does not verify.
    pub fn decrypt(&self, encoded: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let encoded = encoded.as_ref().trim_ascii();
        let framed = STANDARD.decode(encoded)?;
        self.open_frame(&framed)
    }

    /// Build the raw frame for a caller-supplied IV
    pub(crate) fn seal_with_iv(&self, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let iv_len = u8::try_from(iv.len())
            .map_err(|_| CryptoError::InvalidNonce(format!("IV too long: {} bytes", iv.len())))?;
        let sealed = with_iv_size!(iv.len(), seal(&self.key, iv, plaintext))?;

        let mut framed = Vec::with_capacity(1 + iv.len() + sealed.len());
        framed.push(iv_len);
        framed.extend_from_slice(iv);
        framed.extend_from_slice(&sealed);
        Ok(framed)
    }

    /// Split and authenticate a raw frame
    pub(crate) fn open_frame(&self, framed: &[u8]) -> Result<Vec<u8>> {
        let (iv, sealed) = split_frame(framed)?;
        with_iv_size!(iv.len(), open(&self.key, iv, sealed))
    }
}

/// Split `len || iv || ciphertext || tag` into the IV and the sealed payload
fn split_frame(framed: &[u8]) -> Result<(&[u8], &[u8])> {
    let (&iv_len, rest) = framed
        .split_first()
        .ok_or_else(|| CryptoError::InvalidCiphertext("empty frame".to_string()))?;
    let iv_len = iv_len as usize;
    if iv_len == 0 {
        return Err(CryptoError::InvalidNonce("IV length is zero".to_string()));
    }
    if rest.len() < iv_len + TAG_LENGTH {
        return Err(CryptoError::InvalidCiphertext(format!(
            "frame of {} bytes is too short for a {}-byte IV and {}-byte tag",
            framed.len(),
            iv_len,
            TAG_LENGTH
        )));
    }
    Ok(rest.split_at(iv_len))
}

fn seal<N: ArrayLength<u8>>(key: &EnvelopeKey, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = AesGcm::<Aes256, N>::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    cipher
        .encrypt(GenericArray::from_slice(iv), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

fn open<N: ArrayLength<u8>>(key: &EnvelopeKey, iv: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    let cipher = AesGcm::<Aes256, N>::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    cipher
        .decrypt(GenericArray::from_slice(iv), sealed)
        .map_err(|_| CryptoError::Decryption("authentication tag mismatch".to_string()))
}
