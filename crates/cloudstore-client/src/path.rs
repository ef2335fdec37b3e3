//! Request paths, upload keys and file names

use crate::{Result, StoreError};
use unicode_normalization::UnicodeNormalization;

/// Upload keys must be strictly shorter than this
pub const MAX_KEY_LENGTH: usize = 256;

/// Builds path-style request paths under an optional host suffix
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathBuilder {
    host_suffix: String,
}

impl PathBuilder {
    /// Create a builder for the given suffix (e.g. `/v1`)
    pub fn new(host_suffix: impl Into<String>) -> Self {
        Self {
            host_suffix: host_suffix.into(),
        }
    }

    /// The configured host suffix
    pub fn host_suffix(&self) -> &str {
        &self.host_suffix
    }

    /// Path-style base path: `/bucket/` plus the percent-encoded key
    pub fn build_path_base(bucket: &str, key: &str) -> String {
        let mut path = String::from("/");
        if !bucket.is_empty() {
            path.push_str(bucket);
            path.push('/');
        }
        path.push_str(&encode_key(key));
        path
    }

    /// Prefix a path with the host suffix
    pub fn get_path(&self, path: &str) -> String {
        format!("{}{}", self.host_suffix, path)
    }

    /// Full request path for a bucket and key
    pub fn object_path(&self, bucket: &str, key: &str) -> String {
        self.get_path(&Self::build_path_base(bucket, key))
    }
}

/// Percent-encode each segment of a key, keeping `/` separators
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Reject directory names containing anything but ASCII word characters and `/`
pub fn validate_directory(directory: &str) -> Result<()> {
    let valid = directory
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '/');
    if valid {
        Ok(())
    } else {
        Err(StoreError::Config(format!(
            "Invalid character in directory name: {:?}",
            directory
        )))
    }
}

/// Join root dir, directory and file name into an upload key
pub fn form_upload_directory(
    directory: &str,
    filename: &str,
    upload_root_dir: Option<&str>,
) -> Result<String> {
    validate_directory(directory)?;
    let parts = [upload_root_dir.unwrap_or(""), directory, filename];
    Ok(parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/"))
}

/// Reject keys at or above the length limit
pub fn check_key_length(key: &str) -> Result<()> {
    let length = key.chars().count();
    if length >= MAX_KEY_LENGTH {
        return Err(StoreError::Validation(format!(
            "key name is {} characters, limit is {}",
            length,
            MAX_KEY_LENGTH - 1
        )));
    }
    Ok(())
}

/// Reduce a user-supplied file name to a safe ASCII name
///
/// The name is NFKD-normalized and reduced to ASCII (`ü` becomes `u`). `/`
/// becomes a space, whitespace runs become `_`, characters outside
/// `[A-Za-z0-9_.-]` (including `\`) are dropped and leading/trailing `.`/`_`
/// are trimmed, so `../../etc/passwd` becomes `etc_passwd`.
pub fn secure_filename(filename: &str) -> Result<String> {
    let spaced: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        return Err(StoreError::Validation(format!(
            "file name {:?} has no usable characters",
            filename
        )));
    }
    Ok(trimmed.to_string())
}

/// Resolve the object key from a stored URL or a bare path
///
/// The URL path (or the path itself) loses the host suffix, the leading `/`
/// and a leading `bucket/` segment, then is percent-decoded.
pub fn resolve_key(url_or_path: &str, bucket: &str, host_suffix: &str) -> Result<String> {
    let path = match url::Url::parse(url_or_path) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => url_or_path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let mut rest = path.as_str();
    if !host_suffix.is_empty() {
        if let Some(stripped) = rest.strip_prefix(host_suffix) {
            if stripped.starts_with('/') {
                rest = stripped;
            }
        }
    }
    let rest = rest.trim_start_matches('/');
    let rest = rest
        .strip_prefix(bucket)
        .and_then(|r| r.strip_prefix('/'))
        .unwrap_or(rest);

    let key = urlencoding::decode(rest)
        .map_err(|e| StoreError::Config(format!("invalid key encoding in {:?}: {}", url_or_path, e)))?;
    if key.is_empty() {
        return Err(StoreError::Config(format!(
            "no object key in {:?}",
            url_or_path
        )));
    }
    Ok(key.into_owned())
}

/// Drop any query string from a URL
pub fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
