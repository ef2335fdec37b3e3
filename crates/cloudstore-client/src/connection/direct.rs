use super::{HttpTransport, ObjectConnection};
use crate::config::ConnectionConfig;
use crate::path::PathBuilder;
use crate::types::{ConnectionMode, ObjectRequest};
use crate::Result;
use async_trait::async_trait;
use reqwest::Response;
use tracing::instrument;

/// Talks to the object store directly, signing with the selected auth handler
#[derive(Debug)]
pub struct DirectConnection {
    transport: HttpTransport,
}

impl DirectConnection {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Ok(Self {
            transport: HttpTransport::new(config)?,
        })
    }

    /// True when the connection accepts any server certificate
    pub fn tls_verification_disabled(&self) -> bool {
        self.transport.tls_verification_disabled()
    }

    /// Name of the auth handler signing requests
    pub fn auth_handler_name(&self) -> &'static str {
        self.transport.auth_name()
    }
}

#[async_trait]
impl ObjectConnection for DirectConnection {
    fn mode(&self) -> ConnectionMode {
        ConnectionMode::Direct
    }

    fn config(&self) -> &ConnectionConfig {
        self.transport.config()
    }

    fn paths(&self) -> &PathBuilder {
        self.transport.paths()
    }

    #[instrument(skip(self, request), fields(method = %request.method, bucket = %request.bucket, key = %request.key))]
    async fn make_request(&self, request: ObjectRequest) -> Result<Response> {
        self.transport.send(request).await
    }
}
