use super::{HttpTransport, ObjectConnection};
use crate::config::ConnectionConfig;
use crate::path::PathBuilder;
use crate::token::{self, TokenRequest};
use crate::types::{ConnectionMode, ObjectRequest, UploadVerdict};
use crate::{Result, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderValue;
use reqwest::{Response, StatusCode};
use tracing::{debug, instrument};

const JWT_HEADER: &str = "jwt";
const OBJECT_SERVICE_HEADER: &str = "x-objectservice-id";

/// Routes requests through the object service gateway
///
/// Each request carries a fresh token in the `jwt` header and the upper-cased
/// service name in `x-objectservice-id`. The gateway may rewrite responses, so
/// any 2xx upload response counts as success.
#[derive(Debug)]
pub struct ProxiedConnection {
    transport: HttpTransport,
    client_id: String,
    client_secret: String,
    service_id: HeaderValue,
}

impl ProxiedConnection {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        let config = transport.config();

        let client_id = config
            .client_id
            .clone()
            .ok_or_else(|| StoreError::Config("proxied connection requires client_id".to_string()))?;
        let client_secret = config.client_secret.clone().ok_or_else(|| {
            StoreError::Config("proxied connection requires client_secret".to_string())
        })?;
        let service_id = HeaderValue::from_str(&config.object_service_name().to_uppercase())
            .map_err(|e| StoreError::Config(format!("invalid object service name: {}", e)))?;

        Ok(Self {
            transport,
            client_id,
            client_secret,
            service_id,
        })
    }

    /// Mint the request token as of now
    pub fn create_jwt(&self, method: &str, host: &str, bucket: &str, key: &str) -> Result<String> {
        self.create_jwt_at(method, host, bucket, key, Utc::now().timestamp())
    }

    /// Mint the request token as of `now` (unix seconds)
    pub fn create_jwt_at(
        &self,
        method: &str,
        host: &str,
        bucket: &str,
        key: &str,
        now: i64,
    ) -> Result<String> {
        let path = self.transport.paths().object_path(bucket, key);
        let request = TokenRequest {
            method,
            host,
            bucket,
            key,
            path: &path,
        };
        token::create_jwt(
            &request,
            &self.client_id,
            &self.client_secret,
            self.transport.config().token_claims.as_deref(),
            now,
        )
    }
}

#[async_trait]
impl ObjectConnection for ProxiedConnection {
    fn mode(&self) -> ConnectionMode {
        ConnectionMode::Proxied
    }

    fn config(&self) -> &ConnectionConfig {
        self.transport.config()
    }

    fn paths(&self) -> &PathBuilder {
        self.transport.paths()
    }

    fn upload_verdict(&self, status: StatusCode, _etag: Option<&str>, _md5_hex: &str) -> UploadVerdict {
        if status.is_success() {
            UploadVerdict::Accepted
        } else {
            crate::types::standard_upload_verdict(status, None, "")
        }
    }

    #[instrument(skip(self, request), fields(method = %request.method, bucket = %request.bucket, key = %request.key))]
    async fn make_request(&self, mut request: ObjectRequest) -> Result<Response> {
        let jwt = self.create_jwt(
            request.method.as_str(),
            &self.transport.config().host,
            &request.bucket,
            &request.key,
        )?;
        let jwt = HeaderValue::from_str(&jwt)
            .map_err(|e| StoreError::Config(format!("token is not a valid header: {}", e)))?;

        request.headers.insert(JWT_HEADER, jwt);
        request
            .headers
            .insert(OBJECT_SERVICE_HEADER, self.service_id.clone());
        debug!(service = ?self.service_id, "attached gateway token");

        self.transport.send(request).await
    }
}
