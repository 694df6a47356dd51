//! Per-request proxy logic: route, forward, buffer, record.

use super::client::{OutboundClient, OutboundResponse};
use super::recorder::ExchangeRecorder;
use super::route::ForwardRoute;
use super::ProxyError;
use crate::model::{Request, Response};
use bytes::BytesMut;
use futures::{FutureExt, TryStreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Routes and forwards requests, recording each successful exchange.
pub struct Forwarder {
    routes: Vec<Arc<dyn ForwardRoute>>,
    client: Arc<dyn OutboundClient>,
    recorder: Option<Arc<ExchangeRecorder>>,
}

impl Forwarder {
    pub fn new(client: Arc<dyn OutboundClient>) -> Self {
        Self {
            routes: Vec::new(),
            client,
            recorder: None,
        }
    }

    /// Add a route. Routes are asked in registration order; the first one
    /// that returns a forward request is used.
    pub fn with_route(mut self, route: impl ForwardRoute + 'static) -> Self {
        self.routes.push(Arc::new(route));
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<ExchangeRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn recorder(&self) -> Option<&Arc<ExchangeRecorder>> {
        self.recorder.as_ref()
    }

    /// Forward `incoming` and record the exchange.
    pub async fn forward(&self, incoming: Request) -> Result<Response, ProxyError> {
        let forward = self
            .routes
            .iter()
            .find_map(|route| route.route(&incoming))
            .ok_or_else(|| ProxyError::ForwardRouteNotFound(incoming.to_string()))?;
        let target = forward.uri();
        debug!("Forwarding {} {} to {}", incoming.method(), incoming.path(), target);

        let outbound = self
            .client
            .execute(forward)
            .await
            .map_err(|source| ProxyError::ForwardFailed {
                target: target.clone(),
                source,
            })?;
        let response = buffer(outbound)
            .await
            .map_err(|source| ProxyError::ResponseCopyFailed { target, source })?;

        if let Some(recorder) = &self.recorder {
            recorder
                .record(&incoming, &response)
                .map_err(|e| ProxyError::UncaughtProxyFailure(format!("recording failed: {e}")))?;
        }
        Ok(response)
    }

    /// Like `forward`, but every failure (panics included) becomes the
    /// matching status response.
    pub async fn handle(&self, incoming: Request) -> Response {
        let outcome = AssertUnwindSafe(self.forward(incoming))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ProxyError::UncaughtProxyFailure(panic_message(panic.as_ref())))
            });
        match outcome {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    ProxyError::UncaughtProxyFailure(_) => error!("{}", e),
                    _ => warn!("{}", e),
                }
                e.to_response()
            }
        }
    }
}

/// Collect the body once; an empty body is recorded as no content.
async fn buffer(outbound: OutboundResponse) -> Result<Response, super::OutboundError> {
    let body = outbound
        .body
        .try_fold(BytesMut::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await?
        .freeze();

    let mut response = Response::new(outbound.status);
    if let Some(content_type) = outbound.content_type {
        response = response.with_content_type(content_type);
    }
    if !body.is_empty() {
        response = response.with_content(body);
    }
    Ok(response)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
