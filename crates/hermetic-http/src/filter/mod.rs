//! Normalization pipeline run before a matcher compares two requests.
//!
//! A filter turns one `FilterContext` into another. Contexts are immutable:
//! a filter either hands back the same triple or builds a new one, and a
//! side it leaves alone keeps the same `Arc`, so untouched requests are never
//! copied. Filters never fail.

mod headers;

pub use headers::{ContentTypeOnlyFilter, ExtraHeadersFilter};

use crate::model::{Request, Response};
use std::fmt;
use std::sync::Arc;

/// The (expected, candidate, response) triple a filter works on.
#[derive(Debug, Clone)]
pub struct FilterContext {
    expected: Arc<Request>,
    candidate: Arc<Request>,
    response: Arc<Response>,
}

impl FilterContext {
    pub fn new(expected: Arc<Request>, candidate: Arc<Request>, response: Arc<Response>) -> Self {
        Self {
            expected,
            candidate,
            response,
        }
    }

    pub fn expected(&self) -> &Arc<Request> {
        &self.expected
    }

    pub fn candidate(&self) -> &Arc<Request> {
        &self.candidate
    }

    pub fn response(&self) -> &Arc<Response> {
        &self.response
    }

    /// New context with a replaced expected side.
    pub fn with_expected(&self, expected: Arc<Request>) -> Self {
        Self {
            expected,
            ..self.clone()
        }
    }

    /// New context with a replaced candidate side.
    pub fn with_candidate(&self, candidate: Arc<Request>) -> Self {
        Self {
            candidate,
            ..self.clone()
        }
    }
}

/// A single normalization step.
pub trait RequestFilter: Send + Sync + fmt::Debug {
    fn apply(&self, context: FilterContext) -> FilterContext;
}

/// Ordered list of filters applied in registration order.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn RequestFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl RequestFilter + 'static) -> Self {
        self.push(Arc::new(filter));
        self
    }

    pub fn push(&mut self, filter: Arc<dyn RequestFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn apply(&self, context: FilterContext) -> FilterContext {
        self.filters
            .iter()
            .fold(context, |ctx, filter| filter.apply(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Method;

    fn context() -> FilterContext {
        let expected = Request::builder(Method::Get, "/a")
            .header("Accept", "text/plain")
            .build()
            .unwrap();
        let candidate = Request::builder(Method::Get, "/a")
            .header("Accept", "text/plain")
            .header("X-Trace", "1")
            .build()
            .unwrap();
        FilterContext::new(
            Arc::new(expected),
            Arc::new(candidate),
            Arc::new(Response::new(200)),
        )
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let ctx = context();
        let out = FilterChain::new().apply(ctx.clone());
        assert!(Arc::ptr_eq(out.expected(), ctx.expected()));
        assert!(Arc::ptr_eq(out.candidate(), ctx.candidate()));
        assert!(Arc::ptr_eq(out.response(), ctx.response()));
    }

    #[test]
    fn test_filters_run_in_registration_order() {
        let chain = FilterChain::new()
            .with(ExtraHeadersFilter)
            .with(ContentTypeOnlyFilter);
        assert_eq!(chain.len(), 2);

        let out = chain.apply(context());
        assert!(out.candidate().headers().is_empty());
        assert!(out.expected().headers().is_empty());
    }
}
