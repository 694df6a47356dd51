//! Request payload and the comparator that decides payload equality.
//!
//! A `Content` always carries a comparator. The default compares bytes;
//! the structural variants parse JSON or XML and compare the parsed trees,
//! so two differently formatted documents can still be equal. Setting bytes
//! that a structural comparator cannot parse is rejected and leaves the
//! previous bytes and comparator in place.

use super::ModelError;
use bytes::Bytes;
use serde_json::Value;
use std::hash::{Hash, Hasher};
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};

/// Equality rule applied to request payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentComparator {
    /// Byte-for-byte equality.
    #[default]
    Bytes,
    /// JSON documents are equal when their parsed values are equal.
    Json,
    /// XML documents are equal when element names, attributes, child
    /// elements and trimmed text agree.
    Xml,
}

impl ContentComparator {
    pub fn name(&self) -> &'static str {
        match self {
            ContentComparator::Bytes => "bytes",
            ContentComparator::Json => "json",
            ContentComparator::Xml => "xml",
        }
    }

    /// Pick a comparator from a media type such as `application/json; charset=utf-8`.
    pub fn for_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if essence == "application/json" || essence.ends_with("+json") {
            ContentComparator::Json
        } else if essence == "application/xml" || essence == "text/xml" || essence.ends_with("+xml")
        {
            ContentComparator::Xml
        } else {
            ContentComparator::Bytes
        }
    }

    /// Check that `data` can be interpreted by this comparator.
    pub fn check(&self, data: &[u8]) -> Result<(), ModelError> {
        match self {
            ContentComparator::Bytes => Ok(()),
            ContentComparator::Json => serde_json::from_slice::<Value>(data)
                .map(|_| ())
                .map_err(|e| self.incompatible(e.to_string())),
            ContentComparator::Xml => canonical_xml(data)
                .map(|_| ())
                .map_err(|reason| self.incompatible(reason)),
        }
    }

    /// Compare two payloads under this comparator's rule.
    pub fn equivalent(&self, left: &[u8], right: &[u8]) -> bool {
        match self {
            ContentComparator::Bytes => left == right,
            ContentComparator::Json => {
                match (
                    serde_json::from_slice::<Value>(left),
                    serde_json::from_slice::<Value>(right),
                ) {
                    (Ok(l), Ok(r)) => l == r,
                    _ => false,
                }
            }
            ContentComparator::Xml => match (canonical_xml(left), canonical_xml(right)) {
                (Ok(l), Ok(r)) => l == r,
                _ => false,
            },
        }
    }

    /// Normalized form used for hashing; falls back to the raw bytes.
    fn canonical(&self, data: &[u8]) -> Vec<u8> {
        match self {
            ContentComparator::Bytes => data.to_vec(),
            ContentComparator::Json => match serde_json::from_slice::<Value>(data) {
                Ok(value) => {
                    let mut out = String::new();
                    canonical_json(&value, &mut out);
                    out.into_bytes()
                }
                Err(_) => data.to_vec(),
            },
            ContentComparator::Xml => canonical_xml(data)
                .map(String::into_bytes)
                .unwrap_or_else(|_| data.to_vec()),
        }
    }

    fn incompatible(&self, reason: String) -> ModelError {
        ModelError::ContentIncompatible {
            comparator: self.name(),
            reason,
        }
    }
}

/// Payload of a request: optional bytes plus the comparator judging them.
#[derive(Debug, Clone, Default)]
pub struct Content {
    data: Option<Bytes>,
    comparator: ContentComparator,
}

impl Content {
    /// Absent content with the byte comparator.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Content compared byte for byte.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
            comparator: ContentComparator::Bytes,
        }
    }

    pub fn with_comparator(
        comparator: ContentComparator,
        data: Option<Bytes>,
    ) -> Result<Self, ModelError> {
        if let Some(ref bytes) = data {
            comparator.check(bytes)?;
        }
        Ok(Self { data, comparator })
    }

    /// Content whose comparator follows the media type, falling back to
    /// bytes when the payload does not parse as that type.
    pub fn for_content_type(content_type: Option<&str>, data: Option<Bytes>) -> Self {
        let comparator = content_type
            .map(ContentComparator::for_content_type)
            .unwrap_or_default();
        match Self::with_comparator(comparator, data.clone()) {
            Ok(content) => content,
            Err(_) => Self {
                data,
                comparator: ContentComparator::Bytes,
            },
        }
    }

    pub fn bytes(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    pub fn is_absent(&self) -> bool {
        self.data.is_none()
    }

    pub fn comparator(&self) -> ContentComparator {
        self.comparator
    }

    /// Replace the bytes. A structural comparator may reject them, in which
    /// case nothing changes.
    pub fn try_set(&mut self, data: Option<Bytes>) -> Result<(), ModelError> {
        if let Some(ref bytes) = data {
            self.comparator.check(bytes)?;
        }
        self.data = data;
        Ok(())
    }

    /// Swap the comparator, provided the current bytes are compatible with it.
    pub fn try_set_comparator(&mut self, comparator: ContentComparator) -> Result<(), ModelError> {
        if let Some(ref bytes) = self.data {
            comparator.check(bytes)?;
        }
        self.comparator = comparator;
        Ok(())
    }

    /// Equality judged by this side's comparator.
    pub fn matches(&self, other: &Content) -> bool {
        match (&self.data, &other.data) {
            (None, None) => true,
            (Some(left), Some(right)) => self.comparator.equivalent(left, right),
            _ => false,
        }
    }
}

impl PartialEq for Content {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for Content {}

// Consistent with `eq` for contents that share a comparator.
impl Hash for Content {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.data {
            None => 0u8.hash(state),
            Some(bytes) => {
                1u8.hash(state);
                self.comparator.canonical(bytes).hash(state);
            }
        }
    }
}

fn canonical_json(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                canonical_json(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonical_json(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn canonical_xml(data: &[u8]) -> Result<String, String> {
    let text = std::str::from_utf8(data).map_err(|e| e.to_string())?;
    let package = sxd_document::parser::parse(text).map_err(|e| format!("{e:?}"))?;
    let document = package.as_document();
    let mut out = String::new();
    for child in document.root().children() {
        if let ChildOfRoot::Element(element) = child {
            canonical_element(element, &mut out);
        }
    }
    if out.is_empty() {
        return Err("document has no root element".to_string());
    }
    Ok(out)
}

fn canonical_element(element: Element<'_>, out: &mut String) {
    let name = element.name();
    out.push('<');
    if let Some(ns) = name.namespace_uri() {
        out.push('{');
        out.push_str(ns);
        out.push('}');
    }
    out.push_str(name.local_part());

    let mut attributes: Vec<(String, String)> = element
        .attributes()
        .iter()
        .map(|attr| {
            let qname = attr.name();
            let key = match qname.namespace_uri() {
                Some(ns) => format!("{{{ns}}}{}", qname.local_part()),
                None => qname.local_part().to_string(),
            };
            (key, attr.value().to_string())
        })
        .collect();
    attributes.sort();
    for (key, value) in attributes {
        out.push(' ');
        out.push_str(&key);
        out.push_str("=\"");
        out.push_str(&value);
        out.push('"');
    }
    out.push('>');

    let mut text = String::new();
    for child in element.children() {
        match child {
            ChildOfElement::Element(nested) => canonical_element(nested, out),
            ChildOfElement::Text(t) => text.push_str(t.text()),
            _ => {}
        }
    }
    out.push_str(text.trim());
    out.push_str("</>");
}
