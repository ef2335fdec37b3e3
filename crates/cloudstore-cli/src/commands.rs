//! Subcommand implementations

use anyhow::{bail, Context, Result};
use cloudstore_client::{AesGcmEnvelope, CloudStore, UploadRequest, UploadSource};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Options for `upload`
#[derive(Debug)]
pub struct UploadOptions {
    pub bucket: String,
    pub file: PathBuf,
    pub name: Option<String>,
    pub directory: String,
    pub profile: String,
    pub content_type: Option<String>,
    pub encrypt: bool,
    pub skip_type_check: bool,
    pub key_only: bool,
}

pub async fn upload(store: &CloudStore, options: UploadOptions) -> Result<String> {
    let name = match options.name {
        Some(name) => name,
        None => options
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("upload source has no file name")?,
    };

    let mut request = UploadRequest::new(&options.bucket, UploadSource::File(options.file.clone()), name)
        .directory(options.directory)
        .profile(options.profile)
        .file_type_check(!options.skip_type_check)
        .return_key_only(options.key_only)
        .with_encryption(options.encrypt);
    if let Some(content_type) = options.content_type {
        request = request.content_type(content_type);
    }

    let location = store
        .upload(request)
        .await
        .with_context(|| format!("failed to upload {}", options.file.display()))?;
    info!(location = %location, "upload complete");
    Ok(location)
}

pub async fn download(
    store: &CloudStore,
    bucket: &str,
    url_or_path: &str,
    profile: &str,
    decrypt: bool,
    output: Option<&Path>,
) -> Result<()> {
    let object = store
        .download_object(bucket, url_or_path, profile, decrypt)
        .await
        .with_context(|| format!("failed to download {}", url_or_path))?;
    info!(
        size = object.data.len(),
        content_type = ?object.info.content_type,
        "download complete"
    );
    write_output(output, &object.data)
}

pub async fn delete(store: &CloudStore, bucket: &str, url_or_path: &str, profile: &str) -> Result<()> {
    store
        .try_delete(bucket, url_or_path, profile)
        .await
        .with_context(|| format!("failed to delete {}", url_or_path))
}

/// Public URL of a key
pub fn url(store: &CloudStore, bucket: &str, key: &str, profile: &str) -> Result<String> {
    Ok(store.bucket(bucket, profile)?.new_key(key).generate_url())
}

pub fn encrypt(cipher: &AesGcmEnvelope, input: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let plaintext = read_input(input)?;
    let encrypted = cipher.encrypt(&plaintext)?;
    write_output(output, encrypted.as_bytes())
}

pub fn decrypt(cipher: &AesGcmEnvelope, input: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let encoded = read_input(input)?;
    let plaintext = cipher
        .decrypt(&encoded)
        .context("decryption failed, wrong key or corrupted input")?;
    write_output(output, &plaintext)
}

/// Cipher from an explicit secret or the configured file encryption key
pub fn cipher(store: &CloudStore, secret: Option<&str>) -> Result<AesGcmEnvelope> {
    match secret {
        Some(secret) if secret.is_empty() => bail!("encryption key must not be empty"),
        Some(secret) => Ok(AesGcmEnvelope::new(secret)),
        None => Ok(store.cipher()?),
    }
}

fn read_input(input: Option<&Path>) -> Result<Vec<u8>> {
    match input {
        Some(path) => std::fs::read(path).with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buffer = Vec::new();
            std::io::stdin().read_to_end(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn write_output(output: Option<&Path>, data: &[u8]) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, data).with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudstore_client::{ConnectionConfig, StoreSettings, DEFAULT_CONNECTION};

    fn store() -> CloudStore {
        CloudStore::new(
            StoreSettings::default()
                .with_connection(DEFAULT_CONNECTION, ConnectionConfig::new("s3.store.com"))
                .with_encryption_key("file-secret"),
        )
    }

    #[test]
    fn test_encrypt_decrypt_files() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        let sealed = dir.path().join("sealed.txt");
        let opened = dir.path().join("opened.txt");
        std::fs::write(&plain, b"row one\nrow two\n").unwrap();

        let cipher = cipher(&store(), None).unwrap();
        encrypt(&cipher, Some(&plain), Some(&sealed)).unwrap();
        assert_ne!(std::fs::read(&sealed).unwrap(), b"row one\nrow two\n");

        decrypt(&cipher, Some(&sealed), Some(&opened)).unwrap();
        assert_eq!(std::fs::read(&opened).unwrap(), b"row one\nrow two\n");
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        let sealed = dir.path().join("sealed.txt");
        std::fs::write(&plain, b"data").unwrap();

        encrypt(&AesGcmEnvelope::new("one"), Some(&plain), Some(&sealed)).unwrap();
        assert!(decrypt(&AesGcmEnvelope::new("two"), Some(&sealed), None).is_err());
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(cipher(&store(), Some("")).is_err());
    }

    #[test]
    fn test_url() {
        assert_eq!(
            url(&store(), "bucket", "dir/file name.pdf", DEFAULT_CONNECTION).unwrap(),
            "https://s3.store.com/bucket/dir/file%20name.pdf"
        );
    }
}
