//! Public asset uploader
//!
//! Stores avatars and project assets as `container/filename` in the upload
//! bucket with a `public-read` policy.

use crate::bucket::Bucket;
use crate::config::StoreSettings;
use crate::connection::create_connection;
use crate::path::strip_query;
use crate::types::CannedAcl;
use crate::{Result, StoreError};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, warn};

/// Extensions accepted by [`CloudStoreUploader::allowed_file`]
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["js", "css", "png", "jpg", "jpeg", "gif", "zip"];

/// A file handed to the uploader
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// Uploads public assets to the configured upload bucket
#[derive(Debug)]
pub struct CloudStoreUploader {
    settings: Arc<StoreSettings>,
    allowed_extensions: Vec<String>,
    bucket: OnceCell<Bucket>,
}

impl CloudStoreUploader {
    pub fn new(settings: Arc<StoreSettings>) -> Self {
        let allowed_extensions = DEFAULT_ALLOWED_EXTENSIONS
            .iter()
            .map(|e| e.to_string())
            .chain(settings.uploader.allowed_extensions.iter().map(|e| e.to_lowercase()))
            .collect();
        Self {
            settings,
            allowed_extensions,
            bucket: OnceCell::new(),
        }
    }

    /// Upload bucket handle, connected on first use
    async fn bucket(&self) -> Result<&Bucket> {
        self.bucket
            .get_or_try_init(|| async {
                let uploader = &self.settings.uploader;
                let name = uploader
                    .bucket
                    .as_deref()
                    .ok_or_else(|| StoreError::Config("upload bucket is not configured".to_string()))?;
                let config = self.settings.connection(&uploader.connection_profile)?;
                Ok::<_, StoreError>(create_connection(config)?.get_bucket(name))
            })
            .await
    }

    pub fn key_name(container: &str, filename: &str) -> String {
        format!("{}/{}", container, filename)
    }

    /// Lower-cased extension, with `jpg` reported as `jpeg`
    pub fn get_filename_extension(filename: &str) -> Option<String> {
        let (_, extension) = filename.rsplit_once('.')?;
        let extension = extension.to_lowercase();
        if extension == "jpg" {
            Some("jpeg".to_string())
        } else {
            Some(extension)
        }
    }

    /// True when the file name carries an allowed extension
    pub fn allowed_file(&self, filename: &str) -> bool {
        filename
            .rsplit_once('.')
            .map(|(_, extension)| extension.to_lowercase())
            .is_some_and(|extension| self.allowed_extensions.contains(&extension))
    }

    /// Upload a file into a container; failures are logged
    pub async fn upload_file(&self, file: &UploadedFile, container: &str) -> bool {
        match self.try_upload_file(file, container).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, filename = %file.filename, container, "Error uploading");
                false
            }
        }
    }

    async fn try_upload_file(&self, file: &UploadedFile, container: &str) -> Result<()> {
        if !self.allowed_file(&file.filename) {
            return Err(StoreError::Validation(format!(
                "extension not allowed: {}",
                file.filename
            )));
        }
        let key = Self::key_name(container, &file.filename);
        self.bucket()
            .await?
            .new_key(key)
            .set_contents(file.data.clone(), CannedAcl::PublicRead)
            .await?;
        Ok(())
    }

    /// Public URL of a stored file
    ///
    /// Built without contacting the store; the placeholder is returned only
    /// when the upload bucket cannot be resolved. Use [`Self::file_exists`] to
    /// check presence.
    pub async fn lookup_url(&self, container: &str, filename: &str) -> String {
        match self.bucket().await {
            Ok(bucket) => {
                let key = Self::key_name(container, filename);
                strip_query(&bucket.new_key(key).generate_url()).to_string()
            }
            Err(e) => {
                error!(error = %e, container, filename, "lookup failed");
                let uploader = &self.settings.uploader;
                if filename.contains("_avatar") {
                    uploader.user_placeholder_url.clone()
                } else {
                    uploader.project_placeholder_url.clone()
                }
            }
        }
    }

    /// Delete a stored file; failures are logged
    pub async fn delete_file(&self, name: &str, container: &str) -> bool {
        let key = Self::key_name(container, name);
        let result = match self.bucket().await {
            Ok(bucket) => bucket.delete_key(&key).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, key = %key, "Error deleting upload");
                false
            }
        }
    }

    /// Check whether a stored file exists
    pub async fn file_exists(&self, name: &str, container: &str) -> Result<bool> {
        let key = Self::key_name(container, name);
        Ok(self.bucket().await?.lookup(&key).await?.is_some())
    }
}
