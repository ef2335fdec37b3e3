//! Key derivation for envelope encryption
//!
//! Secrets are configured as arbitrary byte strings. The AES key is the
//! SHA-256 digest of the secret, so any secret length yields a 256-bit key.

use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a symmetric key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// AES-256 key derived from a configured secret
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EnvelopeKey {
    key: [u8; KEY_SIZE],
}

impl EnvelopeKey {
    /// Derive the key by hashing the secret with SHA-256
    pub fn derive(secret: impl AsRef<[u8]>) -> Self {
        let digest = Sha256::digest(secret.as_ref());
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnvelopeKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_sha256_of_secret() {
        let key = EnvelopeKey::derive(b"abcd");
        let expected = Sha256::digest(b"abcd");
        assert_eq!(key.as_bytes().as_slice(), expected.as_slice());
    }

    #[test]
    fn test_any_secret_length_gives_256_bits() {
        assert_eq!(EnvelopeKey::derive(b"").as_bytes().len(), KEY_SIZE);
        assert_eq!(EnvelopeKey::derive(vec![7u8; 4096]).as_bytes().len(), KEY_SIZE);
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = EnvelopeKey::derive("secret");
        assert_eq!(format!("{:?}", key), "EnvelopeKey(<redacted>)");
    }
}
