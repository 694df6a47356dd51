//! Outbound HTTP client used to forward proxied requests.

use super::route::ForwardRequest;
use super::tls::NoVerifier;
use crate::config::ConnectionPoolConfig;
use crate::model::CONTENT_TYPE;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum OutboundError {
    #[error("invalid outbound request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Transport(String),
    #[error("response body: {0}")]
    Body(String),
    #[error("TLS setup failed: {0}")]
    Tls(String),
}

/// Response body as it arrives from the upstream.
pub type BodyStream = BoxStream<'static, Result<Bytes, OutboundError>>;

pub struct OutboundResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: BodyStream,
}

impl OutboundResponse {
    /// Response with a body that is already fully available.
    pub fn buffered(status: u16, content_type: Option<String>, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            content_type,
            body: futures::stream::once(async move { Ok(body) }).boxed(),
        }
    }
}

impl std::fmt::Debug for OutboundResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Executes one forward request.
#[async_trait]
pub trait OutboundClient: Send + Sync {
    async fn execute(&self, request: ForwardRequest) -> Result<OutboundResponse, OutboundError>;
}

type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Pooled HTTP/1.1 client over rustls.
#[derive(Clone)]
pub struct HyperOutboundClient {
    client: HttpClient,
}

impl HyperOutboundClient {
    pub fn new(pool: &ConnectionPoolConfig, skip_tls_verify: bool) -> Result<Self, OutboundError> {
        let mut http_connector = HttpConnector::new();
        http_connector.set_keepalive(Some(Duration::from_secs(pool.keepalive_timeout_secs)));
        http_connector.set_connect_timeout(Some(Duration::from_secs(pool.connect_timeout_secs)));
        http_connector.enforce_http(false);

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = if skip_tls_verify {
            warn!("TLS certificate verification DISABLED for the upstream (development/testing only)");
            let tls = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
                .with_safe_default_protocol_versions()
                .map_err(|e| OutboundError::Tls(e.to_string()))?
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier::new(provider)))
                .with_no_client_auth();
            hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(tls)
        } else {
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_provider_and_native_roots(provider)
                .map_err(|e| OutboundError::Tls(e.to_string()))?
        };
        let https_connector = builder
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .build(https_connector);

        info!(
            "Outbound connection pool configured (HTTP/1.1): max_idle={}, idle_timeout={}s, keepalive={}s",
            pool.max_idle_per_host, pool.idle_timeout_secs, pool.keepalive_timeout_secs
        );
        Ok(Self { client })
    }
}

#[async_trait]
impl OutboundClient for HyperOutboundClient {
    async fn execute(&self, forward: ForwardRequest) -> Result<OutboundResponse, OutboundError> {
        let uri = forward.uri();
        let request = &forward.request;
        let mut builder = hyper::Request::builder()
            .method(hyper::Method::from(request.method()))
            .uri(&uri);
        for header in request.headers() {
            builder = builder.header(header.name(), header.value());
        }
        let body = request.content().bytes().cloned().unwrap_or_default();
        let outbound = builder
            .body(Full::new(body))
            .map_err(|e| OutboundError::InvalidRequest(format!("{uri}: {e}")))?;

        let response = self
            .client
            .request(outbound)
            .await
            .map_err(|e| OutboundError::Transport(e.to_string()))?;

        let (parts, incoming) = response.into_parts();
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let body = incoming
            .into_data_stream()
            .map_err(|e| OutboundError::Body(e.to_string()))
            .boxed();

        Ok(OutboundResponse {
            status: parts.status.as_u16(),
            content_type,
            body,
        })
    }
}
