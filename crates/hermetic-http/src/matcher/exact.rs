use super::RequestMatcher;
use crate::model::Request;

/// Full structural equality; the response is returned unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl RequestMatcher for ExactMatcher {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn matches(&self, expected: &Request, candidate: &Request) -> bool {
        expected == candidate
    }
}
