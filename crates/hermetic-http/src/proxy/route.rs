use crate::model::{Header, Request};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request addressed to a concrete upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRequest {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub request: Request,
}

impl ForwardRequest {
    /// Absolute URI including the encoded query string.
    pub fn uri(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme,
            self.host,
            self.port,
            self.request.path_and_query()
        )
    }
}

/// Decides where an inbound request goes. `None` means "not mine".
pub trait ForwardRoute: Send + Sync {
    fn route(&self, incoming: &Request) -> Option<ForwardRequest>;
}

impl<F> ForwardRoute for F
where
    F: Fn(&Request) -> Option<ForwardRequest> + Send + Sync,
{
    fn route(&self, incoming: &Request) -> Option<ForwardRequest> {
        self(incoming)
    }
}

/// Sends everything to one fixed upstream. Only the target and the Host
/// header change; method, path, query, other headers and content are kept.
#[derive(Debug, Clone)]
pub struct PassThroughRoute {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl PassThroughRoute {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }
}

impl ForwardRoute for PassThroughRoute {
    fn route(&self, incoming: &Request) -> Option<ForwardRequest> {
        let host = Header::new("host", format!("{}:{}", self.host, self.port)).ok()?;
        Some(ForwardRequest {
            scheme: self.scheme,
            host: self.host.clone(),
            port: self.port,
            request: incoming.with_header_replaced(host),
        })
    }
}
