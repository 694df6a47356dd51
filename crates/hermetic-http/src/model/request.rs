use super::{Content, ContentComparator, Method, ModelError};
use bytes::Bytes;
use std::collections::BTreeSet;
use std::fmt;

/// Lowercase name of the content type header.
pub const CONTENT_TYPE: &str = "content-type";

/// A single header entry. Names are stored lowercased since HTTP header
/// names are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Header {
    name: String,
    value: String,
}

impl Header {
    pub fn new(name: impl AsRef<str>, value: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(ModelError::BlankHeaderName);
        }
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ModelError::BlankHeaderValue(name.to_string()));
        }
        Ok(Self {
            name: name.to_ascii_lowercase(),
            value,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_content_type(&self) -> bool {
        self.name == CONTENT_TYPE
    }
}

/// A query parameter. The value may be empty but is never absent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryParam {
    key: String,
    value: String,
}

impl QueryParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, ModelError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ModelError::BlankQueryKey);
        }
        Ok(Self {
            key,
            value: value.into(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// HTTP request as seen by the matching engine.
///
/// Headers and query parameters are sets: declaration order never matters,
/// duplicate pairs collapse, and one name with two values stays as two
/// entries. Content equality is decided by the comparator of the left-hand
/// side, so `expected == candidate` asks the expected side's question. `Eq`
/// only holds among requests whose content shares a comparator, so requests
/// are not `Hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    path: String,
    headers: BTreeSet<Header>,
    query: BTreeSet<QueryParam>,
    content: Content,
}

impl Request {
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, path)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &BTreeSet<Header> {
        &self.headers
    }

    pub fn query(&self) -> &BTreeSet<QueryParam> {
        &self.query
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut Content {
        &mut self.content
    }

    /// First content type header value, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.is_content_type())
            .map(Header::value)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// True when every header is a content type header (or there are none).
    pub fn has_only_content_type_headers(&self) -> bool {
        self.headers.iter().all(Header::is_content_type)
    }

    /// Copy of this request with a different header set.
    pub fn with_headers(&self, headers: BTreeSet<Header>) -> Request {
        Request {
            headers,
            ..self.clone()
        }
    }

    /// Copy of this request keeping only the headers accepted by `keep`.
    pub fn retain_headers(&self, keep: impl Fn(&Header) -> bool) -> Request {
        let headers = self.headers.iter().filter(|h| keep(h)).cloned().collect();
        self.with_headers(headers)
    }

    /// Copy of this request with the header `name` replaced by a single value.
    pub fn with_header_replaced(&self, header: Header) -> Request {
        let mut headers: BTreeSet<Header> = self
            .headers
            .iter()
            .filter(|h| h.name != header.name)
            .cloned()
            .collect();
        headers.insert(header);
        self.with_headers(headers)
    }

    /// Path plus encoded query string, as sent on the wire.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|q| {
                format!(
                    "{}={}",
                    urlencoding::encode(&q.key),
                    urlencoding::encode(&q.value)
                )
            })
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }
}

/// Human-readable description, used as the body of "no match" answers.
impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.method, self.path_and_query())?;
        for header in &self.headers {
            writeln!(f, "{}: {}", header.name, header.value)?;
        }
        if let Some(bytes) = self.content.bytes() {
            writeln!(f)?;
            match std::str::from_utf8(bytes) {
                Ok(text) => writeln!(f, "{text}")?,
                Err(_) => writeln!(f, "<{} bytes of binary content>", bytes.len())?,
            }
        }
        Ok(())
    }
}

/// Builder for [`Request`]; validation errors surface from `build`.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    path: String,
    headers: BTreeSet<Header>,
    query: BTreeSet<QueryParam>,
    data: Option<Bytes>,
    comparator: ContentComparator,
    error: Option<ModelError>,
}

impl RequestBuilder {
    fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let error = path
            .contains('?')
            .then(|| ModelError::QueryInPath(path.clone()));
        Self {
            method,
            path,
            headers: BTreeSet::new(),
            query: BTreeSet::new(),
            data: None,
            comparator: ContentComparator::Bytes,
            error,
        }
    }

    fn record<T>(&mut self, result: Result<T, ModelError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.error.get_or_insert(e);
                None
            }
        }
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        if let Some(header) = self.record(Header::new(name, value)) {
            self.headers.insert(header);
        }
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Some(param) = self.record(QueryParam::new(key, value)) {
            self.query.insert(param);
        }
        self
    }

    pub fn content(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn comparator(mut self, comparator: ContentComparator) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn build(self) -> Result<Request, ModelError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let content = Content::with_comparator(self.comparator, self.data)?;
        Ok(Request {
            method: self.method,
            path: self.path,
            headers: self.headers,
            query: self.query,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_declaration_order() {
        let a = Request::builder(Method::Get, "/a")
            .header("Accept", "text/plain")
            .header("X-Id", "1")
            .query("x", "1")
            .query("y", "")
            .build()
            .unwrap();
        let b = Request::builder(Method::Get, "/a")
            .query("y", "")
            .query("x", "1")
            .header("x-id", "1")
            .header("accept", "text/plain")
            .build()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_pairs_collapse_but_values_are_kept() {
        let request = Request::builder(Method::Get, "/a")
            .header("Accept", "a")
            .header("Accept", "a")
            .header("Accept", "b")
            .build()
            .unwrap();
        assert_eq!(request.headers().len(), 2);
    }

    #[test]
    fn test_blank_header_rejected() {
        let err = Request::builder(Method::Get, "/")
            .header("X-Empty", " ")
            .build()
            .unwrap_err();
        assert_eq!(err, ModelError::BlankHeaderValue("X-Empty".to_string()));

        let err = Request::builder(Method::Get, "/")
            .header("", "v")
            .build()
            .unwrap_err();
        assert_eq!(err, ModelError::BlankHeaderName);
    }

    #[test]
    fn test_query_in_path_rejected() {
        let err = Request::builder(Method::Get, "/a?b=1").build().unwrap_err();
        assert_eq!(err, ModelError::QueryInPath("/a?b=1".to_string()));
    }

    #[test]
    fn test_content_compared_with_left_side_comparator() {
        let expected = Request::builder(Method::Post, "/svc")
            .content(r#"{"a": 1}"#)
            .comparator(ContentComparator::Json)
            .build()
            .unwrap();
        let candidate = Request::builder(Method::Post, "/svc")
            .content(r#"{"a":1}"#)
            .build()
            .unwrap();
        assert_eq!(expected, candidate);
        assert_ne!(candidate, expected);
    }

    #[test]
    fn test_equality_is_symmetric_under_a_shared_comparator() {
        let json = |body: &str| {
            Request::builder(Method::Post, "/svc")
                .content(body.to_string())
                .comparator(ContentComparator::Json)
                .build()
                .unwrap()
        };
        let compact = json(r#"{"a":1,"b":2}"#);
        let spaced = json(r#"{ "b": 2, "a": 1 }"#);
        assert_eq!(compact, spaced);
        assert_eq!(spaced, compact);
        assert_ne!(compact, json(r#"{"a":2}"#));
        assert_ne!(json(r#"{"a":2}"#), compact);
    }

    #[test]
    fn test_incompatible_content_fails_build() {
        let err = Request::builder(Method::Post, "/svc")
            .content("<xml/>")
            .comparator(ContentComparator::Json)
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::ContentIncompatible { .. }));
    }

    #[test]
    fn test_path_and_query_encodes_values() {
        let request = Request::builder(Method::Get, "/search")
            .query("q", "a b")
            .query("empty", "")
            .build()
            .unwrap();
        assert_eq!(request.path_and_query(), "/search?empty=&q=a%20b");
    }

    #[test]
    fn test_with_header_replaced() {
        let request = Request::builder(Method::Get, "/")
            .header("Host", "old:1")
            .header("Accept", "*/*")
            .build()
            .unwrap();
        let replaced = request.with_header_replaced(Header::new("host", "new:2").unwrap());
        assert!(replaced
            .headers()
            .contains(&Header::new("host", "new:2").unwrap()));
        assert!(!replaced
            .headers()
            .contains(&Header::new("host", "old:1").unwrap()));
        assert_eq!(replaced.headers().len(), 2);
    }

    #[test]
    fn test_display_describes_request() {
        let request = Request::builder(Method::Post, "/svc")
            .header("Content-Type", "application/json")
            .content(r#"{"a":1}"#)
            .build()
            .unwrap();
        let text = request.to_string();
        assert!(text.starts_with("POST /svc\n"));
        assert!(text.contains("content-type: application/json"));
        assert!(text.contains(r#"{"a":1}"#));
    }
}
