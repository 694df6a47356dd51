use super::forwarding::Forwarder;
use crate::model::{Request, Response};
use crate::transport::{RequestHandler, ServerHandle, TransportError};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

struct ProxyHandler {
    forwarder: Arc<Forwarder>,
}

#[async_trait]
impl RequestHandler for ProxyHandler {
    async fn handle(&self, request: Request) -> Response {
        self.forwarder.handle(request).await
    }
}

/// Listener front end for a `Forwarder`.
///
/// Idle until `start`; `start` while listening closes the previous
/// listener first; `stop` returns to idle.
pub struct InterceptingProxy {
    addr: SocketAddr,
    forwarder: Arc<Forwarder>,
    listener: Mutex<Option<ServerHandle>>,
}

impl InterceptingProxy {
    pub fn new(addr: SocketAddr, forwarder: Forwarder) -> Self {
        Self {
            addr,
            forwarder: Arc::new(forwarder),
            listener: Mutex::new(None),
        }
    }

    pub fn forwarder(&self) -> &Arc<Forwarder> {
        &self.forwarder
    }

    /// Start listening and return the bound address.
    pub async fn start(&self) -> Result<SocketAddr, TransportError> {
        let mut listener = self.listener.lock().await;
        if let Some(previous) = listener.take() {
            info!("Restarting proxy listener on {}", previous.local_addr());
            previous.shutdown().await?;
        }
        let handler = Arc::new(ProxyHandler {
            forwarder: Arc::clone(&self.forwarder),
        });
        let handle = ServerHandle::serve(self.addr, handler).await?;
        let local_addr = handle.local_addr();
        *listener = Some(handle);
        Ok(local_addr)
    }

    pub async fn stop(&self) -> Result<(), TransportError> {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.shutdown().await?;
        }
        Ok(())
    }

    pub async fn is_listening(&self) -> bool {
        self.listener.lock().await.is_some()
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().await.as_ref().map(ServerHandle::local_addr)
    }

    /// Handle one request without going through a listener.
    pub async fn handle(&self, request: Request) -> Response {
        self.forwarder.handle(request).await
    }
}
