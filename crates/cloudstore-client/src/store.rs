//! Upload, download and delete helpers over named connection profiles
//!
//! [`CloudStore`] owns the process-wide [`StoreSettings`] and builds a
//! connection per call from the requested profile. Uploads are staged in a
//! temporary file that is removed when the call returns, whatever the outcome.

use crate::bucket::{Bucket, Key};
use crate::config::{StoreSettings, DEFAULT_CONNECTION};
use crate::connection::{create_connection, Connection};
use crate::path::{check_key_length, form_upload_directory, resolve_key, secure_filename, strip_query, validate_directory};
use crate::sniff::check_type;
use crate::types::{CannedAcl, ObjectData};
use crate::{Result, StoreError};
use bytes::Bytes;
use cloudstore_crypto::AesGcmEnvelope;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, instrument};

/// Content to upload
#[derive(Clone, Debug)]
pub enum UploadSource {
    Bytes(Bytes),
    Text(String),
    /// A file the caller owns; it is read, never removed
    File(PathBuf),
}

/// Parameters of one upload
#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub bucket: String,
    pub source: UploadSource,
    /// File name as it should appear in the store, before sanitizing
    pub target_name: String,
    pub directory: String,
    pub profile: String,
    /// Extra headers stored with the object (`content-type`,
    /// `content-disposition`, `content-encoding`, ...)
    pub headers: Vec<(String, String)>,
    /// Sniff the content and reject types outside the allow-list
    pub file_type_check: bool,
    /// Return the key instead of the public URL
    pub return_key_only: bool,
    pub with_encryption: bool,
    /// Overrides the configured upload root directory
    pub upload_root_dir: Option<String>,
}

impl UploadRequest {
    pub fn new(bucket: impl Into<String>, source: UploadSource, target_name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            source,
            target_name: target_name.into(),
            directory: String::new(),
            profile: DEFAULT_CONNECTION.to_string(),
            headers: Vec::new(),
            file_type_check: true,
            return_key_only: false,
            with_encryption: false,
            upload_root_dir: None,
        }
    }

    pub fn directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Add a header sent with the upload
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn content_type(self, content_type: impl Into<String>) -> Self {
        self.header(CONTENT_TYPE.as_str(), content_type)
    }

    pub fn file_type_check(mut self, enabled: bool) -> Self {
        self.file_type_check = enabled;
        self
    }

    pub fn return_key_only(mut self, enabled: bool) -> Self {
        self.return_key_only = enabled;
        self
    }

    pub fn with_encryption(mut self, enabled: bool) -> Self {
        self.with_encryption = enabled;
        self
    }

    pub fn upload_root_dir(mut self, root: impl Into<String>) -> Self {
        self.upload_root_dir = Some(root.into());
        self
    }
}

/// Source content on disk for the duration of an upload
enum Staged {
    Temp(NamedTempFile),
    Caller(PathBuf),
}

impl Staged {
    fn stage(source: &UploadSource) -> Result<Self> {
        let bytes: &[u8] = match source {
            UploadSource::File(path) => return Ok(Self::Caller(path.clone())),
            UploadSource::Bytes(bytes) => bytes,
            UploadSource::Text(text) => text.as_bytes(),
        };
        let mut file = NamedTempFile::new()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self::Temp(file))
    }

    fn path(&self) -> &Path {
        match self {
            Self::Temp(file) => file.path(),
            Self::Caller(path) => path,
        }
    }
}

fn parse_headers(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| StoreError::Validation(format!("invalid header name {:?}: {}", name, e)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| StoreError::Validation(format!("invalid value for header {}: {}", name, e)))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Object store helpers bound to one settings instance
#[derive(Clone, Debug)]
pub struct CloudStore {
    settings: Arc<StoreSettings>,
}

impl CloudStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }

    /// Share already-loaded settings
    pub fn from_shared(settings: Arc<StoreSettings>) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Build a connection for a profile
    pub fn connect(&self, profile: &str) -> Result<Connection> {
        create_connection(self.settings.connection(profile)?)
    }

    /// Bucket handle on a profile, checked against the allow-list
    pub fn bucket(&self, bucket: &str, profile: &str) -> Result<Bucket> {
        self.settings.check_bucket(bucket)?;
        Ok(self.connect(profile)?.get_bucket(bucket))
    }

    /// Cipher for the configured file encryption key
    pub fn cipher(&self) -> Result<AesGcmEnvelope> {
        self.settings
            .file_encryption_key
            .as_deref()
            .map(AesGcmEnvelope::new)
            .ok_or_else(|| StoreError::Config("file encryption key is not configured".to_string()))
    }

    /// Upload content and return its public URL, or its key when asked
    #[instrument(skip(self, request), fields(bucket = %request.bucket, target = %request.target_name))]
    pub async fn upload(&self, request: UploadRequest) -> Result<String> {
        validate_directory(&request.directory)?;
        let headers = parse_headers(&request.headers)?;
        self.settings.check_bucket(&request.bucket)?;

        let staged = Staged::stage(&request.source)?;
        if request.file_type_check {
            let mime_type = check_type(staged.path(), &self.settings.allowed_mime_types)?;
            debug!(mime_type, "content type accepted");
        }

        let mut content = tokio::fs::read(staged.path()).await?;
        drop(staged);
        if request.with_encryption {
            content = self.cipher()?.encrypt(&content)?.into_bytes();
        }

        let filename = secure_filename(&request.target_name)?;
        let root = request
            .upload_root_dir
            .as_deref()
            .or(self.settings.upload_root_dir.as_deref());
        let upload_key = form_upload_directory(&request.directory, &filename, root)?;
        check_key_length(&upload_key)?;

        let bucket = self.connect(&request.profile)?.get_bucket(&request.bucket);
        let key = bucket.new_key(upload_key).with_headers(headers);
        key.set_contents(Bytes::from(content), CannedAcl::BucketOwnerFullControl)
            .await?;
        info!(key = key.name(), encrypted = request.with_encryption, "uploaded object");

        if request.return_key_only {
            Ok(key.name().to_string())
        } else {
            Ok(strip_query(&key.generate_url()).to_string())
        }
    }

    /// Upload a string under `directory/filename`
    pub async fn upload_from_string(
        &self,
        bucket: &str,
        content: impl Into<String>,
        filename: &str,
        directory: &str,
        profile: &str,
        with_encryption: bool,
    ) -> Result<String> {
        let request = UploadRequest::new(bucket, UploadSource::Text(content.into()), filename)
            .directory(directory)
            .profile(profile)
            .with_encryption(with_encryption);
        self.upload(request).await
    }

    /// Serialize a value as JSON and upload it, to the default bucket unless one is given
    pub async fn upload_json_data<T: Serialize + ?Sized>(
        &self,
        data: &T,
        upload_path: &str,
        file_name: &str,
        encryption: bool,
        profile: &str,
        bucket: Option<&str>,
    ) -> Result<String> {
        let content = serde_json::to_string(data)?;
        let bucket = bucket
            .or(self.settings.default_bucket.as_deref())
            .ok_or_else(|| StoreError::Config("no bucket given and no default bucket configured".to_string()))?;
        self.upload_from_string(bucket, content, file_name, upload_path, profile, encryption)
            .await
    }

    /// Resolve a stored URL or path to its bucket and key handles
    pub fn get_bucket_key(&self, bucket: &str, url_or_path: &str, profile: &str) -> Result<(Bucket, Key)> {
        let config = self.settings.connection(profile)?;
        let key_name = resolve_key(url_or_path, bucket, &config.host_suffix)?;
        let bucket = self.bucket(bucket, profile)?;
        let key = bucket.new_key(key_name);
        Ok((bucket, key))
    }

    /// Download an object with its headers, decrypting the body when asked
    #[instrument(skip(self))]
    pub async fn download_object(
        &self,
        bucket: &str,
        url_or_path: &str,
        profile: &str,
        decrypt: bool,
    ) -> Result<ObjectData> {
        let (_, key) = self.get_bucket_key(bucket, url_or_path, profile)?;
        let mut object = key.get_contents().await?;
        if decrypt {
            object.data = Bytes::from(self.cipher()?.decrypt(&object.data)?);
        }
        Ok(object)
    }

    /// Download an object's content
    pub async fn download(
        &self,
        bucket: &str,
        url_or_path: &str,
        profile: &str,
        decrypt: bool,
    ) -> Result<Bytes> {
        Ok(self
            .download_object(bucket, url_or_path, profile, decrypt)
            .await?
            .data)
    }

    /// Download an object into a fresh temporary file, rewound to the start
    pub async fn download_to_tempfile(
        &self,
        bucket: &str,
        url_or_path: &str,
        profile: &str,
        decrypt: bool,
    ) -> Result<NamedTempFile> {
        let content = self.download(bucket, url_or_path, profile, decrypt).await?;
        let mut file = NamedTempFile::new()?;
        file.write_all(&content)?;
        file.seek(SeekFrom::Start(0))?;
        Ok(file)
    }

    /// Delete an object
    #[instrument(skip(self))]
    pub async fn try_delete(&self, bucket: &str, url_or_path: &str, profile: &str) -> Result<()> {
        let (bucket, key) = self.get_bucket_key(bucket, url_or_path, profile)?;
        bucket.delete_key(key.name()).await
    }

    /// Delete an object, logging and swallowing any failure
    pub async fn delete(&self, bucket: &str, url_or_path: &str, profile: &str) -> bool {
        match self.try_delete(bucket, url_or_path, profile).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, url = url_or_path, "unable to delete file");
                false
            }
        }
    }
}
