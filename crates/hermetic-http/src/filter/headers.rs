//! Built-in header filters.

use super::{FilterContext, RequestFilter};
use crate::model::Request;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Narrows both sides down to their content type header.
///
/// A side that already has no headers, or only content type headers, is
/// passed through as the same `Arc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentTypeOnlyFilter;

impl ContentTypeOnlyFilter {
    fn narrow(request: &Arc<Request>) -> Option<Arc<Request>> {
        if request.has_only_content_type_headers() {
            return None;
        }
        Some(Arc::new(request.retain_headers(|h| h.is_content_type())))
    }
}

impl RequestFilter for ContentTypeOnlyFilter {
    fn apply(&self, context: FilterContext) -> FilterContext {
        let context = match Self::narrow(context.expected()) {
            Some(expected) => context.with_expected(expected),
            None => context,
        };
        match Self::narrow(context.candidate()) {
            Some(candidate) => context.with_candidate(candidate),
            None => context,
        }
    }
}

/// Drops candidate headers whose name the expected request never mentions.
/// The expected side is never modified.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtraHeadersFilter;

impl RequestFilter for ExtraHeadersFilter {
    fn apply(&self, context: FilterContext) -> FilterContext {
        let known: BTreeSet<&str> = context
            .expected()
            .headers()
            .iter()
            .map(|h| h.name())
            .collect();
        let candidate = context.candidate();
        if candidate.headers().iter().all(|h| known.contains(h.name())) {
            return context;
        }
        let narrowed = Arc::new(candidate.retain_headers(|h| known.contains(h.name())));
        context.with_candidate(narrowed)
    }
}
