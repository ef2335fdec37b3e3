//! # Cloudstore Crypto
//!
//! Envelope encryption for objects written to cloud storage.
//!
//! Payloads are sealed with AES-256-GCM under a key derived from a configured
//! secret (SHA-256 of the secret bytes). The output is base64 text that is
//! safe to embed in JSON or store as an object body, and that carries its own
//! IV length so a reader needs nothing but the secret.
//!
//! ## Example
//!
//! ```rust
//! use cloudstore_crypto::AesGcmEnvelope;
//!
//! let cipher = AesGcmEnvelope::new(b"file-encryption-key");
//! let sealed = cipher.encrypt(b"hello world").unwrap();
//! assert_eq!(cipher.decrypt(&sealed).unwrap(), b"hello world");
//! ```

pub mod envelope;
pub mod error;
pub mod keys;

pub use envelope::{AesGcmEnvelope, DEFAULT_IV_LENGTH, SUPPORTED_IV_LENGTHS, TAG_LENGTH};
pub use error::{CryptoError, Result};
pub use keys::{EnvelopeKey, KEY_SIZE};
