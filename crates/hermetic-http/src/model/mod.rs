//! Request/response value types shared by every other module.
//!
//! - `method` - the fixed set of HTTP methods a recording may carry
//! - `content` - request payload plus its replaceable comparator
//! - `request` - `Request`, `Header`, `QueryParam` and the request builder
//! - `response` - `Response`

mod content;
mod method;
mod request;
mod response;

pub use content::{Content, ContentComparator};
pub use method::Method;
pub use request::{Header, QueryParam, Request, RequestBuilder, CONTENT_TYPE};
pub use response::Response;

use thiserror::Error;

/// Errors raised while building or mutating model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("header name must not be blank")]
    BlankHeaderName,
    #[error("header {0:?} must have a non-blank value")]
    BlankHeaderValue(String),
    #[error("query parameter key must not be blank")]
    BlankQueryKey,
    #[error("path {0:?} must not carry a query string")]
    QueryInPath(String),
    #[error("unsupported HTTP method {0:?}")]
    UnknownMethod(String),
    #[error("content is incompatible with the {comparator} comparator: {reason}")]
    ContentIncompatible {
        comparator: &'static str,
        reason: String,
    },
}
