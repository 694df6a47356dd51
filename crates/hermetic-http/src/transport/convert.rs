//! Conversion between hyper messages and the request/response model.

use crate::model::{Content, Method, ModelError, Request, Response, CONTENT_TYPE};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::HeaderValue;
use hyper::StatusCode;
use thiserror::Error;

/// Headers that describe the connection rather than the request. They are
/// dropped on the way in so a request looks the same whichever port or
/// framing it arrived through.
const CONNECTION_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "transfer-encoding",
    "connection",
    "keep-alive",
];

/// An inbound request that cannot be represented in the model.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("header '{0}' is not valid UTF-8")]
    HeaderEncoding(String),
    #[error("invalid percent-encoding in query string: {0}")]
    QueryEncoding(String),
    #[error("failed to read request body: {0}")]
    Body(String),
}

/// Split and decode a raw query string with form-urlencoded rules: `+` is a
/// space, then percent escapes are decoded. Pairs without `=` get an empty
/// value.
pub fn parse_query(raw: &str) -> Result<Vec<(String, String)>, ConversionError> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                urlencoding::decode(&s.replace('+', " "))
                    .map(|d| d.into_owned())
                    .map_err(|_| ConversionError::QueryEncoding(pair.to_string()))
            };
            Ok((decode(key)?, decode(value)?))
        })
        .collect()
}

/// Read a hyper request into the model. An empty body is treated as no
/// content, and the comparator follows the content type.
pub async fn request_from_hyper<B>(req: hyper::Request<B>) -> Result<Request, ConversionError>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();
    let method = Method::try_from(&parts.method)?;

    let mut builder = Request::builder(method, parts.uri.path());
    for (name, value) in parts.headers.iter() {
        if CONNECTION_HEADERS.contains(&name.as_str()) {
            continue;
        }
        let value = value
            .to_str()
            .map_err(|_| ConversionError::HeaderEncoding(name.to_string()))?;
        // Blank values cannot be expected, so they cannot be matched either
        if value.trim().is_empty() {
            continue;
        }
        builder = builder.header(name.as_str(), value);
    }
    if let Some(raw) = parts.uri.query() {
        for (key, value) in parse_query(raw)? {
            builder = builder.query(key, value);
        }
    }
    let mut request = builder.build()?;

    let bytes = body
        .collect()
        .await
        .map_err(|e| ConversionError::Body(e.to_string()))?
        .to_bytes();
    let data = (!bytes.is_empty()).then_some(bytes);
    *request.content_mut() = Content::for_content_type(request.content_type(), data);
    Ok(request)
}

/// Build a hyper response from the model.
pub fn response_to_hyper(response: &Response) -> hyper::Response<Full<Bytes>> {
    let status = StatusCode::from_u16(response.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = hyper::Response::builder().status(status);
    if let Some(content_type) = response.content_type() {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            builder = builder.header(CONTENT_TYPE, value);
        }
    }
    let body = response.content().cloned().unwrap_or_default();
    builder.body(Full::new(body)).unwrap_or_else(|_| {
        // Only reachable with an invalid header, which is filtered above
        hyper::Response::new(Full::new(Bytes::from("Internal Server Error")))
    })
}

/// Plain text response used for diagnostics.
pub fn text_response(status: u16, body: impl Into<String>) -> Response {
    let body: String = body.into();
    Response::new(status)
        .with_content_type("text/plain; charset=utf-8")
        .with_content(body)
}
