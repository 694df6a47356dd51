use super::lines::SectionReader;
use super::FormatError;
use crate::model::{Header, Method, QueryParam, Request};

const METHOD: &str = "[Method]";
const HEADERS: &str = "[HttpMessageHeader]";
const PATH: &str = "[Path]";
const QUERY: &str = "[QueryParameters]";

/// Render the text part of a request. The body is stored separately.
pub fn encode_request(request: &Request) -> Result<String, FormatError> {
    let mut out = String::new();
    push_line(&mut out, METHOD);
    push_line(&mut out, request.method().as_str());

    push_line(&mut out, HEADERS);
    for header in request.headers() {
        check_key("header name", header.name())?;
        check_value("header value", header.value())?;
        push_entry(&mut out, header.name(), header.value());
    }

    push_line(&mut out, PATH);
    check_value("path", request.path())?;
    push_line(&mut out, request.path());

    push_line(&mut out, QUERY);
    for param in request.query() {
        check_key("query key", param.key())?;
        check_value("query value", param.value())?;
        push_entry(&mut out, param.key(), param.value());
    }
    Ok(out)
}

/// Parse the text part of a request; the content is left absent.
pub fn decode_request(text: &str) -> Result<Request, FormatError> {
    let mut reader = SectionReader::new(text);

    reader.expect_marker(METHOD)?;
    let (line, raw) = reader.value("request method")?;
    let method: Method = raw.trim().parse().map_err(|_| FormatError::InvalidValue {
        line,
        what: "method",
        value: raw.to_string(),
    })?;

    reader.expect_marker(HEADERS)?;
    let mut headers = Vec::new();
    for (line, name, value) in reader.entries(Some(PATH))? {
        let header = Header::new(name, value).map_err(|_| FormatError::InvalidValue {
            line,
            what: "header",
            value: format!("{name}={value}"),
        })?;
        headers.push(header);
    }

    reader.expect_marker(PATH)?;
    let (line, path) = reader.value("request path")?;
    if path.contains('?') {
        return Err(FormatError::InvalidValue {
            line,
            what: "path",
            value: path.to_string(),
        });
    }

    reader.expect_marker(QUERY)?;
    let mut query = Vec::new();
    for (line, key, value) in reader.entries(None)? {
        let param = QueryParam::new(key, value).map_err(|_| FormatError::InvalidValue {
            line,
            what: "query parameter",
            value: format!("{key}={value}"),
        })?;
        query.push(param);
    }
    reader.finish()?;

    let builder = headers
        .iter()
        .fold(Request::builder(method, path), |b, h| b.header(h.name(), h.value()));
    let builder = query
        .iter()
        .fold(builder, |b, q| b.query(q.key(), q.value()));
    builder.build().map_err(|e| FormatError::InvalidValue {
        line: 0,
        what: "request",
        value: e.to_string(),
    })
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

fn push_entry(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push('=');
    out.push_str(value);
    out.push('\n');
}

fn check_value(what: &'static str, value: &str) -> Result<(), FormatError> {
    if value.contains(['\r', '\n']) {
        return Err(FormatError::Unencodable {
            what,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_key(what: &'static str, key: &str) -> Result<(), FormatError> {
    check_value(what, key)?;
    if key.contains('=') {
        return Err(FormatError::Unencodable {
            what,
            value: key.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let request = Request::builder(Method::Post, "/orders")
            .header("Content-Type", "application/json")
            .header("Accept", "*/*")
            .query("page", "2")
            .query("filter", "a=b")
            .content("{}")
            .build()
            .unwrap();
        let text = encode_request(&request).unwrap();
        assert_eq!(
            text,
            "[Method]\nPOST\n\
             [HttpMessageHeader]\naccept=*/*\ncontent-type=application/json\n\
             [Path]\n/orders\n\
             [QueryParameters]\nfilter=a=b\npage=2\n"
        );
    }

    #[test]
    fn test_decode_round_trip_without_content() {
        let request = Request::builder(Method::Get, "/a/b")
            .header("X-Multi", "1")
            .header("X-Multi", "2")
            .query("empty", "")
            .build()
            .unwrap();
        let decoded = decode_request(&encode_request(&request).unwrap()).unwrap();
        assert_eq!(decoded, request);
        assert!(decoded.content().is_absent());
    }

    #[test]
    fn test_decode_tolerates_missing_trailing_newline() {
        let decoded =
            decode_request("[Method]\nDELETE\n[HttpMessageHeader]\n[Path]\n/x\n[QueryParameters]")
                .unwrap();
        assert_eq!(decoded.method(), Method::Delete);
        assert_eq!(decoded.path(), "/x");
    }

    #[test]
    fn test_decode_rejects_unknown_method() {
        let err = decode_request("[Method]\nFETCH\n[HttpMessageHeader]\n[Path]\n/\n[QueryParameters]\n")
            .unwrap_err();
        assert_eq!(
            err,
            FormatError::InvalidValue {
                line: 2,
                what: "method",
                value: "FETCH".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_rejects_header_without_equals() {
        let err = decode_request(
            "[Method]\nGET\n[HttpMessageHeader]\nAccept: */*\n[Path]\n/\n[QueryParameters]\n",
        )
        .unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedLine { line: 4, .. }));
    }

    #[test]
    fn test_decode_rejects_sections_out_of_order() {
        let err = decode_request("[Method]\nGET\n[Path]\n/\n[HttpMessageHeader]\n[QueryParameters]\n")
            .unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedLine { line: 3, .. }));
    }

    #[test]
    fn test_newline_in_header_value_is_unencodable() {
        let request = Request::builder(Method::Get, "/")
            .header("X-Bad", "one\r\ntwo")
            .build()
            .unwrap();
        assert!(matches!(
            encode_request(&request),
            Err(FormatError::Unencodable {
                what: "header value",
                ..
            })
        ));
    }

    #[test]
    fn test_equals_in_query_key_is_unencodable() {
        let request = Request::builder(Method::Get, "/")
            .query("a=b", "c")
            .build()
            .unwrap();
        assert!(matches!(
            encode_request(&request),
            Err(FormatError::Unencodable {
                what: "query key",
                ..
            })
        ));
    }
}
