//! Interchangeable request matching strategies.
//!
//! Every strategy answers the pairwise question "does `candidate` satisfy
//! `expected`?" and may adapt the stored response for the candidate.
//! Content equality always defers to the comparator of the expected side.
//!
//! - `ExactMatcher` - full structural equality
//! - `SimpleMatcher` - method, path, query, content type and content
//! - `SupersetHeadersMatcher` - like exact, but the candidate may carry extra headers
//!
//! A `MatchingStrategy` pairs a matcher with the filter chain that
//! normalizes each pair before the matcher sees it. A `BoundMatcher` fixes
//! the expected side, which is the shape the file replay provider uses.

mod exact;
mod simple;
mod superset;

pub use exact::ExactMatcher;
pub use simple::SimpleMatcher;
pub use superset::SupersetHeadersMatcher;

use crate::filter::{ContentTypeOnlyFilter, ExtraHeadersFilter, FilterChain, FilterContext};
use crate::model::{Request, Response};
use std::fmt;
use std::sync::Arc;

/// Pairwise matching contract.
pub trait RequestMatcher: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn matches(&self, expected: &Request, candidate: &Request) -> bool;

    /// Response returned to the candidate. Defaults to the stored response.
    fn adapt(&self, _expected: &Request, response: &Response, _candidate: &Request) -> Response {
        response.clone()
    }
}

/// Method, path and query parameters are equal, and content is equal under
/// the expected side's comparator.
pub(crate) fn same_identity(expected: &Request, candidate: &Request) -> bool {
    expected.method() == candidate.method()
        && expected.path() == candidate.path()
        && expected.query() == candidate.query()
        && expected.content().matches(candidate.content())
}

/// A matcher plus the filters that run before it.
#[derive(Debug, Clone)]
pub struct MatchingStrategy {
    matcher: Arc<dyn RequestMatcher>,
    filters: FilterChain,
}

impl MatchingStrategy {
    pub fn new(matcher: impl RequestMatcher + 'static) -> Self {
        Self::from_arc(Arc::new(matcher))
    }

    pub fn from_arc(matcher: Arc<dyn RequestMatcher>) -> Self {
        Self {
            matcher,
            filters: FilterChain::new(),
        }
    }

    /// Method, path, query, content type and content; other headers are noise.
    pub fn simple() -> Self {
        Self::new(SimpleMatcher).with_filters(FilterChain::new().with(ContentTypeOnlyFilter))
    }

    /// Headers the expectation never mentioned are ignored.
    pub fn ignore_additional_headers() -> Self {
        Self::new(SupersetHeadersMatcher).with_filters(FilterChain::new().with(ExtraHeadersFilter))
    }

    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    pub fn matcher(&self) -> &Arc<dyn RequestMatcher> {
        &self.matcher
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// Run the filter chain over the pair.
    pub fn normalize(
        &self,
        expected: &Arc<Request>,
        candidate: &Arc<Request>,
        response: &Arc<Response>,
    ) -> FilterContext {
        self.filters.apply(FilterContext::new(
            Arc::clone(expected),
            Arc::clone(candidate),
            Arc::clone(response),
        ))
    }

    /// Filter the pair and ask the matcher. Returns the filtered context on a hit.
    pub fn try_match(
        &self,
        expected: &Arc<Request>,
        candidate: &Arc<Request>,
        response: &Arc<Response>,
    ) -> Option<FilterContext> {
        let context = self.normalize(expected, candidate, response);
        self.matcher
            .matches(context.expected(), context.candidate())
            .then_some(context)
    }
}

/// A strategy bound to a single expected request.
#[derive(Debug, Clone)]
pub struct BoundMatcher {
    expected: Arc<Request>,
    strategy: MatchingStrategy,
}

impl BoundMatcher {
    pub fn new(expected: Request, strategy: MatchingStrategy) -> Self {
        Self {
            expected: Arc::new(expected),
            strategy,
        }
    }

    /// Bound matcher that only accepts requests equal to `expected`.
    pub fn exact(expected: Request) -> Self {
        Self::new(expected, MatchingStrategy::new(ExactMatcher))
    }

    pub fn expected(&self) -> &Arc<Request> {
        &self.expected
    }

    pub fn strategy(&self) -> &MatchingStrategy {
        &self.strategy
    }

    pub fn matches(&self, candidate: &Arc<Request>) -> bool {
        let placeholder = Arc::new(Response::new(200));
        self.strategy
            .try_match(&self.expected, candidate, &placeholder)
            .is_some()
    }

    /// Filter the pair against `response` and let the matcher adapt it.
    pub fn adapt(&self, response: Response, candidate: &Arc<Request>) -> Response {
        let context = self
            .strategy
            .normalize(&self.expected, candidate, &Arc::new(response));
        self.strategy.matcher().adapt(
            context.expected(),
            context.response(),
            context.candidate(),
        )
    }
}
