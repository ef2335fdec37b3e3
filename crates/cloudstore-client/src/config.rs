//! Connection profiles and store settings

use crate::token::ClaimTemplate;
use crate::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Name of the connection profile used when callers do not pick one
pub const DEFAULT_CONNECTION: &str = "S3_DEFAULT";

/// Name of the connection profile used by the container uploader
pub const UPLOAD_CONNECTION: &str = "S3_UPLOAD";

/// Provider name reported when no object service is configured
pub const DEFAULT_PROVIDER: &str = "aws";

/// A credential attribute that a custom auth header can carry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialField {
    AccessKey,
    SecretKey,
    SecurityToken,
    ProfileName,
}

/// Connection settings for one object store endpoint
///
/// The presence of `object_service` selects the proxied connection; every
/// other field applies to both modes.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Host requests are sent to
    pub host: String,
    /// Explicit port, omitted from URLs when it is the scheme default
    pub port: Option<u16>,
    /// Use https
    pub is_secure: bool,
    /// Access key id
    pub access_key: Option<String>,
    /// Secret access key
    pub secret_key: Option<String>,
    /// Session token
    pub security_token: Option<String>,
    /// Credential profile name
    pub profile_name: Option<String>,
    /// Signing region
    pub region: String,
    /// Path prefix for gateways that mount the S3 API under a subpath
    pub host_suffix: String,
    /// Skip TLS certificate validation
    pub ssl_no_verify: bool,
    /// Headers filled from credential attributes by the custom auth handler
    pub auth_headers: Vec<(String, CredentialField)>,
    /// Static headers added by the custom auth handler
    pub extra_headers: Vec<(String, String)>,
    /// Hosts the custom auth handler is allowed to serve; empty admits all
    pub custom_auth_hosts: Vec<String>,
    /// Object service behind the proxy gateway
    pub object_service: Option<String>,
    /// Proxy client id (token issuer)
    pub client_id: Option<String>,
    /// Proxy client secret (token signing key)
    pub client_secret: Option<String>,
    /// Host used for public object URLs in proxied mode
    pub upstream_host: Option<String>,
    /// Replacement claim set for proxy tokens
    pub token_claims: Option<Vec<ClaimTemplate>>,
    /// TCP connect timeout
    pub connect_timeout_secs: u64,
    /// Whole-request timeout
    pub read_timeout_secs: u64,
    /// Retries for transient upload failures (500/503)
    pub max_retries: u32,
    /// User agent string
    pub user_agent: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "s3.amazonaws.com".to_string(),
            port: None,
            is_secure: true,
            access_key: None,
            secret_key: None,
            security_token: None,
            profile_name: None,
            region: "us-east-1".to_string(),
            host_suffix: String::new(),
            ssl_no_verify: false,
            auth_headers: Vec::new(),
            extra_headers: Vec::new(),
            custom_auth_hosts: Vec::new(),
            object_service: None,
            client_id: None,
            client_secret: None,
            upstream_host: None,
            token_claims: None,
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
            max_retries: 3,
            user_agent: format!("cloudstore-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("is_secure", &self.is_secure)
            .field("access_key", &self.access_key)
            .field("region", &self.region)
            .field("host_suffix", &self.host_suffix)
            .field("ssl_no_verify", &self.ssl_no_verify)
            .field("object_service", &self.object_service)
            .field("client_id", &self.client_id)
            .field("upstream_host", &self.upstream_host)
            .finish_non_exhaustive()
    }
}

impl ConnectionConfig {
    /// Create a config for the given host
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Set access and secret keys
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Use plain http
    pub fn insecure(mut self) -> Self {
        self.is_secure = false;
        self
    }

    /// Set the host path suffix
    pub fn with_host_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.host_suffix = suffix.into();
        self
    }

    /// Disable TLS certificate validation
    pub fn without_tls_verification(mut self) -> Self {
        self.ssl_no_verify = true;
        self
    }

    /// Route requests through an object service gateway
    pub fn with_proxy(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        object_service: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self.object_service = Some(object_service.into());
        self
    }

    /// Add a custom auth header carrying a credential attribute
    pub fn with_auth_header(mut self, name: impl Into<String>, field: CredentialField) -> Self {
        self.auth_headers.push((name.into(), field));
        self
    }

    /// Add a static header sent by the custom auth handler
    pub fn with_extra_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Restrict the custom auth handler to a host
    pub fn with_custom_auth_host(mut self, host: impl Into<String>) -> Self {
        self.custom_auth_hosts.push(host.into());
        self
    }

    /// True when requests go through an object service gateway
    pub fn is_proxied(&self) -> bool {
        self.object_service.is_some()
    }

    /// Object service name, defaulting to the provider name
    pub fn object_service_name(&self) -> &str {
        self.object_service.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    /// URL scheme
    pub fn scheme(&self) -> &'static str {
        if self.is_secure {
            "https"
        } else {
            "http"
        }
    }

    /// Host header value: the host plus any non-default port
    pub fn host_header(&self) -> String {
        let default_port = if self.is_secure { 443 } else { 80 };
        match self.port {
            Some(port) if port != default_port => format!("{}:{}", self.host, port),
            _ => self.host.clone(),
        }
    }

    /// Base URL requests are sent to
    pub fn endpoint(&self) -> String {
        format!("{}://{}", self.scheme(), self.host_header())
    }

    /// Base URL for public object links
    pub fn public_endpoint(&self) -> String {
        match &self.upstream_host {
            Some(upstream) if self.is_proxied() => format!("{}://{}", self.scheme(), upstream),
            _ => self.endpoint(),
        }
    }

    /// TCP connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Whole-request timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Immutable credential set for this connection
    pub fn credentials(&self) -> Credentials {
        Credentials {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            security_token: self.security_token.clone(),
            profile_name: self.profile_name.clone(),
        }
    }

    /// Check the settings a connection cannot be built without
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(StoreError::Config("host must not be empty".to_string()));
        }
        if !self.host_suffix.is_empty() && !self.host_suffix.starts_with('/') {
            return Err(StoreError::Config(format!(
                "host suffix must start with '/': {}",
                self.host_suffix
            )));
        }
        if self.is_proxied() {
            if self.client_id.as_deref().map_or(true, str::is_empty) {
                return Err(StoreError::Config(
                    "proxied connection requires client_id".to_string(),
                ));
            }
            if self.client_secret.as_deref().map_or(true, str::is_empty) {
                return Err(StoreError::Config(
                    "proxied connection requires client_secret".to_string(),
                ));
            }
        }
        let header_names = self
            .auth_headers
            .iter()
            .map(|(name, _)| name)
            .chain(self.extra_headers.iter().map(|(name, _)| name));
        for name in header_names {
            reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| StoreError::Config(format!("invalid header name {:?}: {}", name, e)))?;
        }
        for (name, value) in &self.extra_headers {
            reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| StoreError::Config(format!("invalid value for header {}: {}", name, e)))?;
        }
        Ok(())
    }
}

/// Access credentials, fixed once a connection is built
#[derive(Clone, Default)]
pub struct Credentials {
    access_key: Option<String>,
    secret_key: Option<String>,
    security_token: Option<String>,
    profile_name: Option<String>,
}

impl Credentials {
    /// Access key id
    pub fn access_key(&self) -> Option<&str> {
        self.access_key.as_deref()
    }

    /// Secret access key
    pub fn secret_key(&self) -> Option<&str> {
        self.secret_key.as_deref()
    }

    /// Session token
    pub fn security_token(&self) -> Option<&str> {
        self.security_token.as_deref()
    }

    /// Look up a credential attribute by field
    pub fn field(&self, field: CredentialField) -> Option<&str> {
        match field {
            CredentialField::AccessKey => self.access_key.as_deref(),
            CredentialField::SecretKey => self.secret_key.as_deref(),
            CredentialField::SecurityToken => self.security_token.as_deref(),
            CredentialField::ProfileName => self.profile_name.as_deref(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("security_token", &self.security_token.as_ref().map(|_| "<redacted>"))
            .field("profile_name", &self.profile_name)
            .finish()
    }
}

/// Settings for the container uploader
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderSettings {
    /// Bucket holding uploaded assets
    pub bucket: Option<String>,
    /// Connection profile used for uploads
    pub connection_profile: String,
    /// Extensions allowed in addition to the defaults
    pub allowed_extensions: Vec<String>,
    /// Placeholder returned for missing user avatars
    pub user_placeholder_url: String,
    /// Placeholder returned for other missing assets
    pub project_placeholder_url: String,
}

impl Default for UploaderSettings {
    fn default() -> Self {
        Self {
            bucket: None,
            connection_profile: UPLOAD_CONNECTION.to_string(),
            allowed_extensions: Vec::new(),
            user_placeholder_url: "/static/img/placeholder.user.png".to_string(),
            project_placeholder_url: "/static/img/placeholder.project.png".to_string(),
        }
    }
}

/// Process-wide storage settings, read-only after startup
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Named connection profiles
    pub connections: HashMap<String, ConnectionConfig>,
    /// Bucket used when a helper is not given one
    pub default_bucket: Option<String>,
    /// Root directory prepended to upload keys
    pub upload_root_dir: Option<String>,
    /// Secret for envelope encryption of stored files
    pub file_encryption_key: Option<String>,
    /// MIME types accepted by upload type checks
    pub allowed_mime_types: Vec<String>,
    /// Buckets helpers may touch; empty admits all
    pub allowed_buckets: Vec<String>,
    /// Container uploader settings
    pub uploader: UploaderSettings,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            connections: HashMap::new(),
            default_bucket: None,
            upload_root_dir: None,
            file_encryption_key: None,
            allowed_mime_types: crate::sniff::DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_buckets: Vec::new(),
            uploader: UploaderSettings::default(),
        }
    }
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("connections", &self.connections)
            .field("default_bucket", &self.default_bucket)
            .field("upload_root_dir", &self.upload_root_dir)
            .field(
                "file_encryption_key",
                &self.file_encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .field("allowed_mime_types", &self.allowed_mime_types)
            .field("allowed_buckets", &self.allowed_buckets)
            .field("uploader", &self.uploader)
            .finish()
    }
}

impl StoreSettings {
    /// Register a connection profile
    pub fn with_connection(mut self, name: impl Into<String>, config: ConnectionConfig) -> Self {
        self.connections.insert(name.into(), config);
        self
    }

    /// Set the file encryption secret
    pub fn with_encryption_key(mut self, secret: impl Into<String>) -> Self {
        self.file_encryption_key = Some(secret.into());
        self
    }

    /// Look up a connection profile
    ///
    /// Names match case-insensitively, since environment overrides and some
    /// config loaders lower-case keys.
    pub fn connection(&self, profile: &str) -> Result<&ConnectionConfig> {
        self.connections
            .get(profile)
            .or_else(|| {
                self.connections
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(profile))
                    .map(|(_, config)| config)
            })
            .ok_or_else(|| StoreError::Config(format!("unknown connection profile: {}", profile)))
    }

    /// Reject buckets outside the allow-list
    pub fn check_bucket(&self, bucket: &str) -> Result<()> {
        if bucket.is_empty() {
            return Err(StoreError::Config("bucket name must not be empty".to_string()));
        }
        if !self.allowed_buckets.is_empty() && !self.allowed_buckets.iter().any(|b| b == bucket) {
            return Err(StoreError::Config(format!("bucket not allowed: {}", bucket)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_omits_default_port() {
        let config = ConnectionConfig::new("s3.store.com").with_port(443);
        assert_eq!(config.endpoint(), "https://s3.store.com");

        let config = ConnectionConfig::new("127.0.0.1").insecure().with_port(9000);
        assert_eq!(config.endpoint(), "http://127.0.0.1:9000");
        assert_eq!(config.host_header(), "127.0.0.1:9000");
    }

    #[test]
    fn test_public_endpoint_prefers_upstream_when_proxied() {
        let mut config = ConnectionConfig::new("proxy.local").with_proxy("id", "secret", "s3");
        config.upstream_host = Some("s3.store.com".to_string());
        assert_eq!(config.public_endpoint(), "https://s3.store.com");

        let mut direct = ConnectionConfig::new("s3.store.com");
        direct.upstream_host = Some("ignored.example".to_string());
        assert_eq!(direct.public_endpoint(), "https://s3.store.com");
    }

    #[test]
    fn test_proxy_requires_client_credentials() {
        let mut config = ConnectionConfig::new("proxy.local");
        config.object_service = Some("s3".to_string());
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));

        let config = ConnectionConfig::new("proxy.local").with_proxy("id", "secret", "s3");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let config = ConnectionConfig::new("s3.store.com").with_extra_header("bad header", "v");
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = ConnectionConfig::new("h")
            .with_credentials("AKID", "super-secret")
            .credentials();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_bucket_allow_list() {
        let mut settings = StoreSettings::default();
        assert!(settings.check_bucket("anything").is_ok());

        settings.allowed_buckets = vec!["uploads".to_string()];
        assert!(settings.check_bucket("uploads").is_ok());
        assert!(matches!(
            settings.check_bucket("other"),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_deserialize_profile() {
        let json = r#"{
            "connections": {
                "S3_DEFAULT": {
                    "host": "bcos.example.com",
                    "port": 443,
                    "host_suffix": "/v1",
                    "auth_headers": [["x-account", "access_key"], ["x-secret", "secret_key"]]
                }
            },
            "allowed_buckets": ["results"]
        }"#;
        let settings: StoreSettings = serde_json::from_str(json).unwrap();
        let profile = settings.connection(DEFAULT_CONNECTION).unwrap();
        assert_eq!(profile.host_suffix, "/v1");
        assert_eq!(profile.auth_headers[1], ("x-secret".to_string(), CredentialField::SecretKey));
        assert!(profile.is_secure);
        assert!(settings.allowed_mime_types.iter().any(|m| m == "application/pdf"));
        assert!(settings.connection("s3_default").is_ok());
        assert!(settings.connection("S3_MISSING").is_err());
    }
}
