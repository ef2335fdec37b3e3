//! Content-based MIME type detection for upload checks

use crate::{Result, StoreError};
use std::io::Read;
use std::path::Path;

/// MIME types accepted when no allow-list is configured
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "text/csv",
    "text/richtext",
    "text/tab-separated-values",
    "text/xml",
    "text/plain",
    "application/oda",
    "text/html",
    "application/xml",
    "image/jpeg",
    "image/png",
    "image/bmp",
    "image/x-ms-bmp",
    "image/gif",
    "application/zip",
];

/// Reported for zero-length content
pub const EMPTY_MIME_TYPE: &str = "inode/x-empty";

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Bytes read from a file for detection
const SNIFF_LEN: u64 = 8192;

/// Detect the MIME type of a buffer from its content
///
/// Magic numbers win; otherwise UTF-8 text is `text/plain` and anything else
/// is `application/octet-stream`. A prefix cut mid-character still counts as
/// text.
pub fn sniff_mime_type(content: &[u8]) -> &'static str {
    if content.is_empty() {
        return EMPTY_MIME_TYPE;
    }
    if let Some(kind) = infer::get(content) {
        return kind.mime_type();
    }
    match std::str::from_utf8(content) {
        Ok(_) => "text/plain",
        Err(e) if e.error_len().is_none() => "text/plain",
        Err(_) => FALLBACK_MIME_TYPE,
    }
}

/// Detect the MIME type of a file from its leading bytes
pub fn sniff_file(path: &Path) -> Result<&'static str> {
    let mut head = Vec::new();
    std::fs::File::open(path)?
        .take(SNIFF_LEN)
        .read_to_end(&mut head)?;
    Ok(sniff_mime_type(&head))
}

/// Reject a file whose sniffed MIME type is not in the allow-list
pub fn check_type(path: &Path, allowed: &[String]) -> Result<&'static str> {
    let mime_type = sniff_file(path)?;
    if allowed.iter().any(|m| m == mime_type) {
        Ok(mime_type)
    } else {
        Err(StoreError::Validation(format!(
            "File type not supported: {}",
            mime_type
        )))
    }
}
