//! Error types for the cloudstore-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during envelope encryption
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Encryption failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed, including authentication tag mismatch
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Invalid key material
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The framed ciphertext is truncated or malformed
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// Unsupported or malformed IV
    #[error("invalid nonce: {0}")]
    InvalidNonce(String),

    /// Base64 decode error
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

impl CryptoError {
    /// True when the ciphertext failed to authenticate
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Decryption(_))
    }
}
