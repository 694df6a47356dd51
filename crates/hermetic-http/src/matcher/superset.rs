use super::{same_identity, RequestMatcher};
use crate::model::Request;

/// Candidate matches when method, path, query and content are equal and its
/// headers contain every expected header with an equal value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupersetHeadersMatcher;

impl RequestMatcher for SupersetHeadersMatcher {
    fn name(&self) -> &'static str {
        "superset-headers"
    }

    fn matches(&self, expected: &Request, candidate: &Request) -> bool {
        same_identity(expected, candidate) && expected.headers().is_subset(candidate.headers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentComparator, Method};

    #[test]
    fn test_extra_headers_match() {
        let expected = Request::builder(Method::Post, "/svc")
            .header("Content-Type", "application/json")
            .content(r#"{"a":1}"#)
            .comparator(ContentComparator::Json)
            .build()
            .unwrap();
        let candidate = Request::builder(Method::Post, "/svc")
            .header("X-Trace", "123")
            .header("Content-Type", "application/json")
            .content(r#"{ "a": 1 }"#)
            .build()
            .unwrap();
        assert!(SupersetHeadersMatcher.matches(&expected, &candidate));
    }

    #[test]
    fn test_missing_header_does_not_match() {
        let expected = Request::builder(Method::Get, "/a")
            .header("Accept", "text/plain")
            .header("X-Tenant", "t1")
            .build()
            .unwrap();
        let candidate = Request::builder(Method::Get, "/a")
            .header("Accept", "text/plain")
            .build()
            .unwrap();
        assert!(!SupersetHeadersMatcher.matches(&expected, &candidate));
    }

    #[test]
    fn test_header_value_must_be_equal() {
        let expected = Request::builder(Method::Get, "/a")
            .header("Accept", "text/plain")
            .build()
            .unwrap();
        let candidate = Request::builder(Method::Get, "/a")
            .header("Accept", "text/html")
            .build()
            .unwrap();
        assert!(!SupersetHeadersMatcher.matches(&expected, &candidate));
    }
}
