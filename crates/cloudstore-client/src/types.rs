//! Common types for the client SDK

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use std::collections::HashMap;

/// Prefix of user metadata headers
const META_PREFIX: &str = "x-amz-meta-";

/// Canned access policy applied on upload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CannedAcl {
    Private,
    PublicRead,
    BucketOwnerFullControl,
}

impl CannedAcl {
    /// Value of the `x-amz-acl` header
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
            Self::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

/// Which connection variant serves a profile
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionMode {
    Direct,
    Proxied,
}

/// How an upload response is treated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadVerdict {
    /// Stored
    Accepted,
    /// Transient failure, send again
    Retry,
    /// Stored, but the returned ETag does not match the payload digest
    DigestMismatch,
    /// Failed
    Rejected,
}

/// Put object result
#[derive(Clone, Debug)]
pub struct PutObjectResult {
    /// ETag of the uploaded object, if the store returned one
    pub etag: Option<String>,
    /// Final response status
    pub status: u16,
    /// Attempts made, retries included
    pub attempts: u32,
}

/// Object headers returned by GET and HEAD
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectInfo {
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    pub content_length: Option<u64>,
    /// User metadata, without the `x-amz-meta-` prefix
    pub metadata: HashMap<String, String>,
}

impl ObjectInfo {
    /// Read object attributes from response headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let metadata = headers
            .iter()
            .filter_map(|(name, value)| {
                let key = name.as_str().strip_prefix(META_PREFIX)?;
                Some((key.to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();

        Self {
            etag: text("etag").map(|e| e.trim_matches('"').to_string()),
            content_type: text("content-type"),
            content_encoding: text("content-encoding"),
            content_disposition: text("content-disposition"),
            content_length: text("content-length").and_then(|l| l.parse().ok()),
            metadata,
        }
    }
}

/// Object content together with its headers
#[derive(Clone, Debug)]
pub struct ObjectData {
    pub data: Bytes,
    pub info: ObjectInfo,
}

/// A request against a bucket or object
#[derive(Clone, Debug)]
pub struct ObjectRequest {
    pub method: Method,
    pub bucket: String,
    pub key: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ObjectRequest {
    pub fn new(method: Method, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            method,
            bucket: bucket.into(),
            key: key.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Set a header
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the request body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Upload verdict shared by both connection variants
///
/// A 2xx response is accepted when the ETag is missing or equals the MD5 of
/// the payload; 500 and 503 are retried; anything else is rejected.
pub fn standard_upload_verdict(status: StatusCode, etag: Option<&str>, md5_hex: &str) -> UploadVerdict {
    if status.is_success() {
        match etag.map(|e| e.trim_matches('"')) {
            Some(etag) if !etag.eq_ignore_ascii_case(md5_hex) => UploadVerdict::DigestMismatch,
            _ => UploadVerdict::Accepted,
        }
    } else if status == StatusCode::INTERNAL_SERVER_ERROR
        || status == StatusCode::SERVICE_UNAVAILABLE
    {
        UploadVerdict::Retry
    } else {
        UploadVerdict::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MD5: &str = "5d41402abc4b2a76b9719d911017c592";

    #[test]
    fn test_standard_verdict() {
        assert_eq!(
            standard_upload_verdict(StatusCode::OK, Some("\"5d41402abc4b2a76b9719d911017c592\""), MD5),
            UploadVerdict::Accepted
        );
        assert_eq!(standard_upload_verdict(StatusCode::OK, None, MD5), UploadVerdict::Accepted);
        assert_eq!(
            standard_upload_verdict(StatusCode::OK, Some("\"deadbeef\""), MD5),
            UploadVerdict::DigestMismatch
        );
        assert_eq!(
            standard_upload_verdict(StatusCode::SERVICE_UNAVAILABLE, None, MD5),
            UploadVerdict::Retry
        );
        assert_eq!(
            standard_upload_verdict(StatusCode::FORBIDDEN, None, MD5),
            UploadVerdict::Rejected
        );
    }

    #[test]
    fn test_object_info_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("etag", HeaderValue::from_static("\"abc\""));
        headers.insert("content-type", HeaderValue::from_static("application/pdf"));
        headers.insert("content-length", HeaderValue::from_static("42"));
        headers.insert("x-amz-meta-owner", HeaderValue::from_static("alice"));

        let info = ObjectInfo::from_headers(&headers);
        assert_eq!(info.etag.as_deref(), Some("abc"));
        assert_eq!(info.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(info.content_length, Some(42));
        assert_eq!(info.metadata.get("owner").map(String::as_str), Some("alice"));
        assert!(info.content_encoding.is_none());
    }

    #[test]
    fn test_canned_acl_header_values() {
        assert_eq!(CannedAcl::PublicRead.as_str(), "public-read");
        assert_eq!(
            CannedAcl::BucketOwnerFullControl.as_str(),
            "bucket-owner-full-control"
        );
    }
}
