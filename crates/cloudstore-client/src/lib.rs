//! # Cloudstore Client
//!
//! Object store client for S3-compatible services, either reached directly or
//! through an object service gateway that authorizes each request with a
//! short-lived signed token.
//!
//! ## Features
//!
//! - **Two connection modes**: direct (AWS SigV4 or custom auth headers) and
//!   proxied (HS256 request tokens), chosen per connection profile
//! - **Path-style addressing** under an optional host suffix
//! - **Upload helpers**: file type checks, safe key names, optional envelope
//!   encryption, public URLs
//! - **Asset uploader** for public avatars and project files
//!
//! ## Example
//!
//! ```rust,ignore
//! use cloudstore_client::{CloudStore, ConnectionConfig, StoreSettings, DEFAULT_CONNECTION};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = StoreSettings::default()
//!         .with_connection(
//!             DEFAULT_CONNECTION,
//!             ConnectionConfig::new("s3.example.com").with_credentials("AKID", "secret"),
//!         )
//!         .with_encryption_key("file-secret");
//!     let store = CloudStore::new(settings);
//!
//!     let url = store
//!         .upload_from_string("bucket", "a,b\n1,2\n", "data.csv", "exports", DEFAULT_CONNECTION, true)
//!         .await?;
//!     let content = store.download("bucket", &url, DEFAULT_CONNECTION, true).await?;
//!     println!("{}", String::from_utf8_lossy(&content));
//!     Ok(())
//! }
//! ```

pub mod auth;
mod bucket;
mod config;
pub mod connection;
mod error;
pub mod path;
pub mod sniff;
mod store;
pub mod token;
mod types;
mod uploader;

pub use bucket::{Bucket, Key};
pub use config::{
    ConnectionConfig, CredentialField, Credentials, StoreSettings, UploaderSettings,
    DEFAULT_CONNECTION, DEFAULT_PROVIDER, UPLOAD_CONNECTION,
};
pub use connection::{create_connection, Connection, DirectConnection, ObjectConnection, ProxiedConnection};
pub use error::{Result, StoreError};
pub use store::{CloudStore, UploadRequest, UploadSource};
pub use types::*;
pub use uploader::{CloudStoreUploader, UploadedFile, DEFAULT_ALLOWED_EXTENSIONS};

// Re-export the cipher so callers can decrypt without a direct dependency
pub use cloudstore_crypto::{AesGcmEnvelope, CryptoError};
