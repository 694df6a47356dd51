use super::{text_response, RequestHandler, ServerHandle, TransportError};
use crate::model::{Request, Response};
use crate::store::{ProviderError, ResponseProvider};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::error;

struct ProviderHandler {
    provider: Arc<dyn ResponseProvider>,
}

#[async_trait]
impl RequestHandler for ProviderHandler {
    async fn handle(&self, request: Request) -> Response {
        match self.provider.resolve(&request) {
            Ok(Some(response)) => response,
            Ok(None) => text_response(self.provider.not_found_status(), request.to_string()),
            Err(e) => {
                error!("Response provider failed: {}", e);
                text_response(500, e.to_string())
            }
        }
    }
}

/// A listener answering from a `ResponseProvider`.
///
/// Unmatched requests get the provider's not-found status with a
/// description of the request as the body.
pub struct MockServer {
    handle: ServerHandle,
    provider: Arc<dyn ResponseProvider>,
}

impl MockServer {
    pub async fn start(
        addr: SocketAddr,
        provider: Arc<dyn ResponseProvider>,
    ) -> Result<Self, TransportError> {
        let handler = Arc::new(ProviderHandler {
            provider: Arc::clone(&provider),
        });
        let handle = ServerHandle::serve(addr, handler).await?;
        Ok(Self { handle, provider })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.handle.local_addr()
    }

    /// Base URL, e.g. `http://127.0.0.1:8080`.
    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr())
    }

    pub fn provider(&self) -> &Arc<dyn ResponseProvider> {
        &self.provider
    }

    pub fn verify(&self) -> Result<(), ProviderError> {
        self.provider.verify()
    }

    pub fn reset(&self) {
        self.provider.reset()
    }

    pub async fn stop(self) -> Result<(), TransportError> {
        self.handle.shutdown().await
    }
}
