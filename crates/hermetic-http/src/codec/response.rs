use super::lines::SectionReader;
use super::FormatError;
use crate::model::Response;

const STATUS: &str = "[HttpCode]";
const CONTENT_TYPE: &str = "[ContentType]";

/// Render the text part of a response. The body is stored separately.
pub fn encode_response(response: &Response) -> Result<String, FormatError> {
    let mut out = format!("{STATUS}\n{}\n{CONTENT_TYPE}\n", response.status());
    if let Some(content_type) = response.content_type() {
        // Blank or padded values would read back differently
        if content_type.contains(['\r', '\n'])
            || content_type.is_empty()
            || content_type.trim() != content_type
        {
            return Err(FormatError::Unencodable {
                what: "content type",
                value: content_type.to_string(),
            });
        }
        out.push_str(content_type);
        out.push('\n');
    }
    Ok(out)
}

/// Parse the text part of a response; the content is left absent.
pub fn decode_response(text: &str) -> Result<Response, FormatError> {
    let mut reader = SectionReader::new(text);

    reader.expect_marker(STATUS)?;
    let (line, raw) = reader.value("status code")?;
    let status = raw
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|s| (100..=999).contains(s))
        .ok_or_else(|| FormatError::InvalidValue {
            line,
            what: "status code",
            value: raw.to_string(),
        })?;

    reader.expect_marker(CONTENT_TYPE)?;
    let content_type = reader.optional_value().map(|(_, t)| t.trim().to_string());
    reader.finish()?;

    let response = Response::new(status);
    Ok(match content_type {
        Some(ct) => response.with_content_type(ct),
        None => response,
    })
}
