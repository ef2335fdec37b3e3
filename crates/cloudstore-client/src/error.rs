//! Client error types

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;

/// S3 error codes that mean the credentials or token were rejected
const AUTH_ERROR_CODES: &[&str] = &[
    "AccessDenied",
    "ExpiredToken",
    "InvalidAccessKeyId",
    "InvalidToken",
    "SignatureDoesNotMatch",
];

/// Object store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport error (connect, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration or caller-supplied path
    #[error("Configuration error: {0}")]
    Config(String),

    /// Content rejected before it reached the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Gateway or store rejected the credentials or token
    #[error("Authentication rejected ({code}): {message}")]
    Auth {
        status: u16,
        code: String,
        message: String,
    },

    /// Any other failure reported by the store
    #[error("S3 error ({code}): {message}")]
    Backend {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// Object not found
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Envelope encryption error
    #[error("Encryption error: {0}")]
    Crypto(#[from] cloudstore_crypto::CryptoError),

    /// IO error on a staged file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Request token could not be signed
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl StoreError {
    /// Build an error from a failed response and its (possibly empty) XML body
    pub fn from_response(status: StatusCode, body: &str, bucket: &str, key: &str) -> Self {
        let code = extract_xml_element(body, "Code")
            .unwrap_or_else(|| format!("HTTP{}", status.as_u16()));
        let message = extract_xml_element(body, "Message").unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

        if status == StatusCode::NOT_FOUND && (code == "NoSuchKey" || code.starts_with("HTTP")) {
            return Self::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            };
        }

        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || AUTH_ERROR_CODES.contains(&code.as_str())
        {
            return Self::Auth {
                status: status.as_u16(),
                code,
                message,
            };
        }

        Self::Backend {
            status: status.as_u16(),
            code,
            message,
            request_id: extract_xml_element(body, "RequestId"),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
            || matches!(self, Self::Backend { code, .. } if code == "NoSuchKey" || code == "NoSuchBucket")
    }

    /// Check if credentials or the request token were rejected
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Check if the caller supplied invalid input
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Validation(_))
    }

    /// HTTP status reported by the store, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Backend { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn extract_xml_element(xml: &str, element: &str) -> Option<String> {
    let start_tag = format!("<{}>", element);
    let end_tag = format!("</{}>", element);

    let start = xml.find(&start_tag)? + start_tag.len();
    let end = xml[start..].find(&end_tag)? + start;

    if start < end {
        Some(xml[start..end].to_string())
    } else {
        None
    }
}
