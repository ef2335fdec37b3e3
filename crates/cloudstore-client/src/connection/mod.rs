//! Object store connections
//!
//! [`create_connection`] picks the variant from the profile: a profile naming
//! an `object_service` is routed through the gateway ([`ProxiedConnection`]),
//! anything else talks to the store directly ([`DirectConnection`]). Both
//! address objects path-style (`/{suffix}/{bucket}/{key}`).

mod direct;
mod proxied;

pub use direct::DirectConnection;
pub use proxied::ProxiedConnection;

use crate::auth::{select_auth_handler, AuthHandler, SignableRequest};
use crate::bucket::Bucket;
use crate::config::ConnectionConfig;
use crate::path::PathBuilder;
use crate::types::{standard_upload_verdict, ConnectionMode, ObjectRequest, UploadVerdict};
use crate::{Result, StoreError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Behaviour shared by direct and proxied connections
#[async_trait]
pub trait ObjectConnection: Send + Sync + fmt::Debug {
    /// Which variant this is
    fn mode(&self) -> ConnectionMode;

    /// Settings the connection was built from
    fn config(&self) -> &ConnectionConfig;

    /// Suffix-aware path builder
    fn paths(&self) -> &PathBuilder;

    /// Prefix a path with the host suffix
    fn get_path(&self, path: &str) -> String {
        self.paths().get_path(path)
    }

    /// Public URL of an object, without query string
    fn generate_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}{}",
            self.config().public_endpoint(),
            PathBuilder::build_path_base(bucket, key)
        )
    }

    /// Decide what an upload response means
    fn upload_verdict(&self, status: StatusCode, etag: Option<&str>, md5_hex: &str) -> UploadVerdict {
        standard_upload_verdict(status, etag, md5_hex)
    }

    /// Retries allowed for transient upload failures
    fn max_retries(&self) -> u32 {
        self.config().max_retries
    }

    /// Send a request; the caller interprets the status
    async fn make_request(&self, request: ObjectRequest) -> Result<Response>;
}

/// Cloneable handle to a connection
#[derive(Clone, Debug)]
pub struct Connection {
    inner: Arc<dyn ObjectConnection>,
}

impl Connection {
    pub fn new(inner: Arc<dyn ObjectConnection>) -> Self {
        Self { inner }
    }

    /// Bucket handle; the bucket is not checked for existence
    pub fn get_bucket(&self, name: impl Into<String>) -> Bucket {
        Bucket::new(Arc::clone(&self.inner), name)
    }

    /// The underlying connection
    pub fn inner(&self) -> &Arc<dyn ObjectConnection> {
        &self.inner
    }

    pub fn mode(&self) -> ConnectionMode {
        self.inner.mode()
    }

    pub fn get_path(&self, path: &str) -> String {
        self.inner.get_path(path)
    }

    pub fn generate_url(&self, bucket: &str, key: &str) -> String {
        self.inner.generate_url(bucket, key)
    }

    pub async fn make_request(&self, request: ObjectRequest) -> Result<Response> {
        self.inner.make_request(request).await
    }
}

/// Build the connection variant a profile asks for
pub fn create_connection(config: &ConnectionConfig) -> Result<Connection> {
    let inner: Arc<dyn ObjectConnection> = if config.is_proxied() {
        Arc::new(ProxiedConnection::new(config.clone())?)
    } else {
        Arc::new(DirectConnection::new(config.clone())?)
    };
    debug!(host = %config.host, mode = ?inner.mode(), "created connection");
    Ok(Connection::new(inner))
}

/// HTTP plumbing shared by both variants: client, paths and auth handler
pub(crate) struct HttpTransport {
    config: ConnectionConfig,
    paths: PathBuilder,
    http: Client,
    auth: Box<dyn AuthHandler>,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("config", &self.config)
            .field("auth", &self.auth.name())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub(crate) fn new(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| StoreError::Config(format!("invalid user agent: {}", e)))?,
        );

        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .default_headers(headers);

        if config.is_secure && config.ssl_no_verify {
            warn!(host = %config.host, "TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build()?;
        let auth = select_auth_handler(&config);
        debug!(host = %config.host, handler = auth.name(), "selected auth handler");

        Ok(Self {
            paths: PathBuilder::new(config.host_suffix.clone()),
            config,
            http,
            auth,
        })
    }

    pub(crate) fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub(crate) fn paths(&self) -> &PathBuilder {
        &self.paths
    }

    pub(crate) fn auth_name(&self) -> &'static str {
        self.auth.name()
    }

    /// True when certificates are not checked on this connection
    pub(crate) fn tls_verification_disabled(&self) -> bool {
        self.config.is_secure && self.config.ssl_no_verify
    }

    /// Authenticate and send a request
    pub(crate) async fn send(&self, mut request: ObjectRequest) -> Result<Response> {
        let path = self.paths.object_path(&request.bucket, &request.key);
        let host = self.config.host_header();
        let url = format!("{}{}", self.config.endpoint(), path);

        if request.body.is_empty() && request.method == reqwest::Method::PUT {
            request.headers.insert(CONTENT_LENGTH, HeaderValue::from(0u16));
        }

        let mut signable = SignableRequest {
            method: &request.method,
            host: &host,
            path: &path,
            headers: &mut request.headers,
            payload: &request.body,
        };
        self.auth.add_auth(&mut signable)?;

        debug!(method = %request.method, url = %url, handler = self.auth.name(), "sending request");

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .headers(request.headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await?;
        debug!(status = %response.status(), url = %url, "received response");
        Ok(response)
    }
}
