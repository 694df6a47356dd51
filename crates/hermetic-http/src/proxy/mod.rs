//! Intercepting proxy that forwards real traffic and records every exchange.
//!
//! - `route` - forward-request builders, including `PassThroughRoute`
//! - `client` - the `OutboundClient` seam and its hyper implementation
//! - `tls` - certificate verifier for `tls_skip_verify`
//! - `recorder` - sequence numbering on top of the exchange codec
//! - `forwarding` - route, forward, buffer, record, map failures
//! - `server` - `InterceptingProxy` listener lifecycle
//!
//! Failures never escape the proxy; each maps to a dedicated status code:
//!
//! | status | failure |
//! |---|---|
//! | 570 | no route produced a forward request |
//! | 571 | the outbound request failed |
//! | 572 | reading the forwarded response body failed |
//! | 573 | anything else, including panics and recording errors |

mod client;
mod forwarding;
mod recorder;
mod route;
mod server;
mod tls;

pub use client::{BodyStream, HyperOutboundClient, OutboundClient, OutboundError, OutboundResponse};
pub use forwarding::Forwarder;
pub use recorder::ExchangeRecorder;
pub use route::{ForwardRequest, ForwardRoute, PassThroughRoute, Scheme};
pub use server::InterceptingProxy;
pub use tls::NoVerifier;

use crate::model::Response;
use crate::transport::text_response;
use thiserror::Error;

pub const ROUTE_NOT_FOUND_STATUS: u16 = 570;
pub const FORWARD_FAILED_STATUS: u16 = 571;
pub const RESPONSE_COPY_FAILED_STATUS: u16 = 572;
pub const UNCAUGHT_FAILURE_STATUS: u16 = 573;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Carries the description of the unroutable request.
    #[error("no forward route for request:\n{0}")]
    ForwardRouteNotFound(String),
    #[error("forwarding to {target} failed: {source}")]
    ForwardFailed {
        target: String,
        #[source]
        source: OutboundError,
    },
    #[error("copying the response from {target} failed: {source}")]
    ResponseCopyFailed {
        target: String,
        #[source]
        source: OutboundError,
    },
    #[error("uncaught proxy failure: {0}")]
    UncaughtProxyFailure(String),
}

impl ProxyError {
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::ForwardRouteNotFound(_) => ROUTE_NOT_FOUND_STATUS,
            ProxyError::ForwardFailed { .. } => FORWARD_FAILED_STATUS,
            ProxyError::ResponseCopyFailed { .. } => RESPONSE_COPY_FAILED_STATUS,
            ProxyError::UncaughtProxyFailure(_) => UNCAUGHT_FAILURE_STATUS,
        }
    }

    /// Text response carrying the status code and the error description.
    pub fn to_response(&self) -> Response {
        text_response(self.status_code(), self.to_string())
    }
}
