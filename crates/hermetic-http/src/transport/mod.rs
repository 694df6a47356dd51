//! HTTP transport on tokio and hyper.
//!
//! A `ServerHandle` owns one listener and its accept loop. Each connection
//! is served on its own task; every request is converted to the model,
//! passed to a `RequestHandler`, and the model response converted back.
//!
//! - `network` - listener construction
//! - `convert` - hyper <-> model conversion
//! - `mock` - `MockServer`, a `ResponseProvider` behind a listener

mod convert;
mod mock;
mod network;

pub use convert::{parse_query, request_from_hyper, response_to_hyper, text_response, ConversionError};
pub use mock::MockServer;
pub use network::create_reusable_listener;

use crate::model::{Request, Response};
use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Answers one model request with one model response.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> Response;
}

/// A running listener. Dropping the handle leaves the server running;
/// call `shutdown` to stop it.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Bind `addr` and start serving `handler`. Port 0 picks a free port.
    pub async fn serve(
        addr: SocketAddr,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<Self, TransportError> {
        let listener = create_reusable_listener(addr)
            .map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;
        info!("Listening on {}", local_addr);

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                let handler = Arc::clone(&handler);
                                tokio::spawn(async move {
                                    let io = TokioIo::new(stream);
                                    let service = service_fn(move |req| {
                                        let handler = Arc::clone(&handler);
                                        async move { dispatch(req, handler).await }
                                    });
                                    if let Err(e) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection error from {}: {}", peer, e);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Accept error on {}: {}", local_addr, e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Listener on {} shutting down", local_addr);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            local_addr,
            shutdown_tx,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections. Returns once the listener is closed.
    pub async fn shutdown(self) -> Result<(), TransportError> {
        let _ = self.shutdown_tx.send(());
        self.task.await?;
        Ok(())
    }
}

async fn dispatch(
    req: hyper::Request<Incoming>,
    handler: Arc<dyn RequestHandler>,
) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
    let response = match request_from_hyper(req).await {
        Ok(request) => handler.handle(request).await,
        Err(e) => {
            warn!("Rejecting request: {}", e);
            text_response(400, e.to_string())
        }
    };
    Ok(response_to_hyper(&response))
}
