//! Encrypted storage demo
//!
//! Encrypts a JSON document with the file encryption key before upload and
//! decrypts it on download. The second half shows the envelope format on its
//! own, without a store.
//!
//! Run with: cargo run --example encrypted_storage

use bytes::Bytes;
use cloudstore_client::{CloudStore, ConnectionConfig, StoreSettings, DEFAULT_CONNECTION};
use cloudstore_crypto::{AesGcmEnvelope, TAG_LENGTH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // ==================== Envelope format ====================

    let cipher = AesGcmEnvelope::new("demo-file-secret");
    let sealed = cipher.encrypt(b"hello")?;
    println!("Sealed 5 bytes into {} base64 chars: {}", sealed.len(), sealed);
    println!(
        "   frame = 1 length byte + {}-byte IV + 5-byte ciphertext + {}-byte tag",
        cipher.iv_length(),
        TAG_LENGTH
    );
    println!("   opened: {}", String::from_utf8(cipher.decrypt(&sealed)?)?);

    let wider = AesGcmEnvelope::new("demo-file-secret").with_iv_length(16)?;
    let sealed = wider.encrypt(b"hello")?;
    println!("   16-byte IV frame opens with the default reader: {:?}", cipher.decrypt(&sealed).map(Bytes::from)?);

    // ==================== Encrypted upload ====================

    let host = std::env::var("CLOUDSTORE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let settings = StoreSettings::default()
        .with_connection(DEFAULT_CONNECTION, ConnectionConfig::new(host).insecure().with_port(9000))
        .with_encryption_key("demo-file-secret");
    let store = CloudStore::new(settings);

    let document = serde_json::json!({"project": 7, "answers": ["yes", "no"]});
    match store
        .upload_json_data(&document, "private", "answers.json", true, DEFAULT_CONNECTION, Some("demo"))
        .await
    {
        Ok(url) => {
            println!("\nUploaded encrypted document: {}", url);
            let raw = store.download("demo", &url, DEFAULT_CONNECTION, false).await?;
            println!("   stored bytes: {}", String::from_utf8_lossy(&raw));
            let plain = store.download("demo", &url, DEFAULT_CONNECTION, true).await?;
            println!("   decrypted: {}", String::from_utf8_lossy(&plain));
        }
        Err(e) => println!("\nNo store reachable ({}), skipping upload", e),
    }

    Ok(())
}
