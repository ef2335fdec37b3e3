//! Bucket and key handles

use crate::connection::ObjectConnection;
use crate::types::{CannedAcl, ObjectData, ObjectInfo, ObjectRequest, PutObjectResult, UploadVerdict};
use crate::{Result, StoreError};
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use md5::{Digest, Md5};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, ETAG};
use reqwest::{Method, Response, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const ACL_HEADER: &str = "x-amz-acl";
const CONTENT_MD5: &str = "content-md5";

/// Delay before the first upload retry, doubled on each further attempt
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(20);

/// A bucket on a connection
#[derive(Clone)]
pub struct Bucket {
    connection: Arc<dyn ObjectConnection>,
    name: String,
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.name)
            .field("mode", &self.connection.mode())
            .finish()
    }
}

impl Bucket {
    pub(crate) fn new(connection: Arc<dyn ObjectConnection>, name: impl Into<String>) -> Self {
        Self {
            connection,
            name: name.into(),
        }
    }

    /// Bucket name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle for a key; nothing is sent
    pub fn new_key(&self, name: impl Into<String>) -> Key {
        Key {
            connection: Arc::clone(&self.connection),
            bucket: self.name.clone(),
            name: name.into(),
            content_type: None,
            headers: HeaderMap::new(),
        }
    }

    /// Alias of [`Bucket::new_key`]
    pub fn get_key(&self, name: impl Into<String>) -> Key {
        self.new_key(name)
    }

    /// HEAD a key, returning its headers or `None` when it does not exist
    #[instrument(skip(self), fields(bucket = %self.name))]
    pub async fn lookup(&self, name: &str) -> Result<Option<ObjectInfo>> {
        let response = self
            .connection
            .make_request(ObjectRequest::new(Method::HEAD, &self.name, name))
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::from_response(status, "", &self.name, name));
        }
        Ok(Some(ObjectInfo::from_headers(response.headers())))
    }

    /// Delete a key; any 2xx response is success
    #[instrument(skip(self), fields(bucket = %self.name))]
    pub async fn delete_key(&self, name: &str) -> Result<()> {
        let response = self
            .connection
            .make_request(ObjectRequest::new(Method::DELETE, &self.name, name))
            .await?;
        let response = check_status(response, &self.name, name).await?;
        debug!(key = name, status = %response.status(), "deleted object");
        Ok(())
    }
}

/// An object handle
#[derive(Clone)]
pub struct Key {
    connection: Arc<dyn ObjectConnection>,
    bucket: String,
    name: String,
    content_type: Option<String>,
    headers: HeaderMap,
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("bucket", &self.bucket)
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("headers", &self.headers)
            .finish()
    }
}

impl Key {
    /// Object key
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Content type sent on upload
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Extra headers sent on upload; the ACL and `Content-MD5` always win
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Upload the object
    ///
    /// Sends `Content-MD5` and the canned ACL, and lets the connection judge
    /// each response: 500/503 are retried with backoff up to the connection's
    /// retry limit.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, key = %self.name, size = data.len()))]
    pub async fn set_contents(&self, data: Bytes, acl: CannedAcl) -> Result<PutObjectResult> {
        let digest = Md5::digest(&data);
        let md5_hex = hex::encode(&digest);
        let md5_b64 = STANDARD.encode(&digest);

        let mut request = ObjectRequest::new(Method::PUT, &self.bucket, &self.name);
        request.headers = self.headers.clone();
        let mut request = request
            .header(HeaderName::from_static(ACL_HEADER), HeaderValue::from_static(acl.as_str()))
            .header(HeaderName::from_static(CONTENT_MD5), header_value(&md5_b64)?)
            .body(data);
        if let Some(content_type) = &self.content_type {
            request = request.header(CONTENT_TYPE, header_value(content_type)?);
        }

        let max_retries = self.connection.max_retries();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let response = self.connection.make_request(request.clone()).await?;
            let status = response.status();
            let etag = response
                .headers()
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .map(|e| e.trim_matches('"').to_string());

            match self
                .connection
                .upload_verdict(status, etag.as_deref(), &md5_hex)
            {
                UploadVerdict::Accepted => {
                    debug!(status = %status, attempts = attempt, "upload accepted");
                    return Ok(PutObjectResult {
                        etag,
                        status: status.as_u16(),
                        attempts: attempt,
                    });
                }
                UploadVerdict::DigestMismatch => {
                    return Err(StoreError::Backend {
                        status: status.as_u16(),
                        code: "BadDigest".to_string(),
                        message: format!(
                            "ETag {} does not match payload MD5 {}",
                            etag.unwrap_or_default(),
                            md5_hex
                        ),
                        request_id: None,
                    });
                }
                UploadVerdict::Retry if attempt <= max_retries => {
                    let delay = retry_delay(attempt);
                    warn!(status = %status, attempt, ?delay, "transient upload failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                UploadVerdict::Retry | UploadVerdict::Rejected => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(StoreError::from_response(status, &body, &self.bucket, &self.name));
                }
            }
        }
    }

    /// Download the object with its headers
    #[instrument(skip(self), fields(bucket = %self.bucket, key = %self.name))]
    pub async fn get_contents(&self) -> Result<ObjectData> {
        let response = self
            .connection
            .make_request(ObjectRequest::new(Method::GET, &self.bucket, &self.name))
            .await?;
        let response = check_status(response, &self.bucket, &self.name).await?;
        let info = ObjectInfo::from_headers(response.headers());
        let data = response.bytes().await?;
        Ok(ObjectData { data, info })
    }

    /// Delete the object
    pub async fn delete(&self) -> Result<()> {
        Bucket::new(Arc::clone(&self.connection), self.bucket.clone())
            .delete_key(&self.name)
            .await
    }

    /// Public URL of the object
    pub fn generate_url(&self) -> String {
        self.connection.generate_url(&self.bucket, &self.name)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| StoreError::Validation(format!("invalid header value {:?}: {}", value, e)))
}

fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(1 << attempt.saturating_sub(1).min(16))
        .min(RETRY_MAX_DELAY)
}

/// Pass 2xx responses through, map anything else to an error
async fn check_status(response: Response, bucket: &str, key: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::from_response(status, &body, bucket, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::connection::create_connection;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

    async fn bucket_for(server: &MockServer, config: ConnectionConfig) -> Bucket {
        let address = server.address();
        let mut config = config.insecure().with_port(address.port());
        config.host = address.ip().to_string();
        create_connection(&config).unwrap().get_bucket("bucket")
    }

    #[rstest::rstest]
    #[case(200)]
    #[case(204)]
    #[tokio::test]
    async fn test_delete_accepts_any_2xx(#[case] status: u16) {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/bucket/key"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;

        let bucket = bucket_for(&server, ConnectionConfig::default()).await;
        bucket.delete_key("key").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_failure_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                "<Error><Code>AccessDenied</Code><Message>no</Message></Error>",
            ))
            .mount(&server)
            .await;

        let bucket = bucket_for(&server, ConnectionConfig::default()).await;
        let err = bucket.delete_key("key").await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_upload_sends_md5_and_acl() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket/dir/hello.txt"))
            .and(header("x-amz-acl", "bucket-owner-full-control"))
            .and(header("content-md5", "XUFAKrxLKna5cZ2REBfFkg=="))
            .and(header("content-type", "text/plain"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("etag", format!("\"{}\"", HELLO_MD5)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let bucket = bucket_for(&server, ConnectionConfig::default()).await;
        let result = bucket
            .new_key("dir/hello.txt")
            .with_content_type("text/plain")
            .set_contents(Bytes::from_static(b"hello"), CannedAcl::BucketOwnerFullControl)
            .await
            .unwrap();
        assert_eq!(result.etag.as_deref(), Some(HELLO_MD5));
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn test_upload_digest_mismatch_fails() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"deadbeef\""))
            .mount(&server)
            .await;

        let bucket = bucket_for(&server, ConnectionConfig::default()).await;
        let err = bucket
            .new_key("k")
            .set_contents(Bytes::from_static(b"hello"), CannedAcl::Private)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend { ref code, .. } if code == "BadDigest"));
    }

    #[tokio::test]
    async fn test_upload_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let bucket = bucket_for(&server, ConnectionConfig::default()).await;
        let result = bucket
            .new_key("k")
            .set_contents(Bytes::from_static(b"hello"), CannedAcl::Private)
            .await
            .unwrap();
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn test_upload_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let mut config = ConnectionConfig::default();
        config.max_retries = 1;
        let bucket = bucket_for(&server, config).await;
        let err = bucket
            .new_key("k")
            .set_contents(Bytes::from_static(b"hello"), CannedAcl::Private)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_lookup_missing_key() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/bucket/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/bucket/present"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
            .mount(&server)
            .await;

        let bucket = bucket_for(&server, ConnectionConfig::default()).await;
        assert!(bucket.lookup("missing").await.unwrap().is_none());
        let info = bucket.lookup("present").await.unwrap().unwrap();
        assert_eq!(info.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_get_contents_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                "<Error><Code>NoSuchKey</Code><Message>missing</Message></Error>",
            ))
            .mount(&server)
            .await;

        let bucket = bucket_for(&server, ConnectionConfig::default()).await;
        let err = bucket.new_key("gone").get_contents().await.unwrap_err();
        assert!(err.is_not_found());
    }
}
