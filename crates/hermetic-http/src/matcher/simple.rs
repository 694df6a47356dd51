use super::{same_identity, RequestMatcher};
use crate::model::Request;

/// Method, path, query, content type and content. All other headers are
/// ignored, which tolerates auth tokens and trace ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleMatcher;

impl RequestMatcher for SimpleMatcher {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn matches(&self, expected: &Request, candidate: &Request) -> bool {
        same_identity(expected, candidate) && expected.content_type() == candidate.content_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Method;

    fn post(content_type: Option<&str>, extra: &[(&str, &str)], body: &str) -> Request {
        let mut builder = Request::builder(Method::Post, "/svc").content(body.to_string());
        if let Some(ct) = content_type {
            builder = builder.header("Content-Type", ct);
        }
        for (name, value) in extra {
            builder = builder.header(*name, *value);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_simple_ignores_other_headers() {
        let expected = post(Some("text/plain"), &[("Authorization", "a")], "hi");
        let candidate = post(Some("text/plain"), &[("X-Trace", "1")], "hi");
        assert!(SimpleMatcher.matches(&expected, &candidate));
    }

    #[test]
    fn test_simple_compares_content_type() {
        let expected = post(Some("text/plain"), &[], "hi");
        assert!(!SimpleMatcher.matches(&expected, &post(Some("text/html"), &[], "hi")));
        assert!(!SimpleMatcher.matches(&expected, &post(None, &[], "hi")));
    }

    #[test]
    fn test_simple_compares_content() {
        let expected = post(None, &[], "hi");
        assert!(!SimpleMatcher.matches(&expected, &post(None, &[], "bye")));
    }
}
