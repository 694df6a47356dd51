//! On-disk exchange format used for capture and replay.
//!
//! Each exchange is up to four files sharing a base name and a zero-padded
//! five digit sequence number:
//!
//! ```text
//! <base>_request_00001.txt          method, headers, path, query
//! <base>_request_entity_00001.txt   raw request body (only if present)
//! <base>_response_00001.txt         status code, content type
//! <base>_response_entity_00001.txt  raw response body (only if present)
//! ```
//!
//! The text files are UTF-8, newline terminated, with fixed section
//! markers and one `name=value` line per header or query entry. Entity
//! files hold raw bytes; a missing entity file means "no content".
//!
//! - `lines` - strict section reader
//! - `request` - request text encoding
//! - `response` - response text encoding

mod lines;
mod request;
mod response;

pub use request::{decode_request, encode_request};
pub use response::{decode_response, encode_response};

use crate::model::{Content, Request, Response};
use bytes::Bytes;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Width of the zero-padded sequence suffix.
pub const SEQUENCE_WIDTH: usize = 5;

/// Problems with the text of a single recording file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("line {line}: expected {expected}, found {found:?}")]
    UnexpectedLine {
        line: usize,
        expected: String,
        found: String,
    },
    #[error("line {line}: expected {expected}, found end of file")]
    UnexpectedEof { line: usize, expected: String },
    #[error("line {line}: invalid {what} {value:?}")]
    InvalidValue {
        line: usize,
        what: &'static str,
        value: String,
    },
    #[error("{what} {value:?} cannot be written to the line format")]
    Unencodable { what: &'static str, value: String },
}

/// Errors reading or writing recorded exchanges.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed recording {path}: {source}")]
    MalformedRecording {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
    #[error("missing recording {0}")]
    MissingRecording(PathBuf),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The four file paths of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangePaths {
    pub request: PathBuf,
    pub request_entity: PathBuf,
    pub response: PathBuf,
    pub response_entity: PathBuf,
}

/// Reads and writes exchanges for one base name inside one directory.
#[derive(Debug, Clone)]
pub struct ExchangeCodec {
    directory: PathBuf,
    base_name: String,
}

impl ExchangeCodec {
    pub fn new(directory: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            base_name: base_name.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn paths(&self, sequence: u32) -> ExchangePaths {
        let file = |kind: &str| {
            self.directory.join(format!(
                "{}_{kind}_{sequence:0width$}.txt",
                self.base_name,
                width = SEQUENCE_WIDTH
            ))
        };
        ExchangePaths {
            request: file("request"),
            request_entity: file("request_entity"),
            response: file("response"),
            response_entity: file("response_entity"),
        }
    }

    pub fn has_request(&self, sequence: u32) -> bool {
        self.paths(sequence).request.is_file()
    }

    pub fn has_response(&self, sequence: u32) -> bool {
        self.paths(sequence).response.is_file()
    }

    pub fn write_request(&self, sequence: u32, request: &Request) -> Result<(), CodecError> {
        let paths = self.paths(sequence);
        let text = encode_request(request).map_err(|source| CodecError::MalformedRecording {
            path: paths.request.clone(),
            source,
        })?;
        self.ensure_directory()?;
        write_file(&paths.request, text.as_bytes())?;
        write_entity(&paths.request_entity, request.content().bytes())
    }

    pub fn write_response(&self, sequence: u32, response: &Response) -> Result<(), CodecError> {
        let paths = self.paths(sequence);
        let text = encode_response(response).map_err(|source| CodecError::MalformedRecording {
            path: paths.response.clone(),
            source,
        })?;
        self.ensure_directory()?;
        write_file(&paths.response, text.as_bytes())?;
        write_entity(&paths.response_entity, response.content())
    }

    /// Write both halves of an exchange.
    pub fn write_exchange(
        &self,
        sequence: u32,
        request: &Request,
        response: &Response,
    ) -> Result<(), CodecError> {
        self.write_request(sequence, request)?;
        self.write_response(sequence, response)?;
        debug!(
            "Wrote exchange {} #{} ({} {})",
            self.base_name,
            sequence,
            request.method(),
            request.path()
        );
        Ok(())
    }

    pub fn read_request(&self, sequence: u32) -> Result<Request, CodecError> {
        let paths = self.paths(sequence);
        let text = read_text(&paths.request)?;
        let mut request =
            decode_request(&text).map_err(|source| CodecError::MalformedRecording {
                path: paths.request.clone(),
                source,
            })?;
        let entity = read_entity(&paths.request_entity)?;
        let content = Content::for_content_type(request.content_type(), entity);
        *request.content_mut() = content;
        Ok(request)
    }

    /// Status and content type of a recorded response, without its body.
    pub fn read_response_head(&self, sequence: u32) -> Result<Response, CodecError> {
        let path = self.paths(sequence).response;
        let text = read_text(&path)?;
        decode_response(&text).map_err(|source| CodecError::MalformedRecording { path, source })
    }

    pub fn read_response(&self, sequence: u32) -> Result<Response, CodecError> {
        let response = self.read_response_head(sequence)?;
        Ok(match read_entity(&self.paths(sequence).response_entity)? {
            Some(entity) => response.with_content(entity),
            None => response,
        })
    }

    fn ensure_directory(&self) -> Result<(), CodecError> {
        fs::create_dir_all(&self.directory).map_err(|source| CodecError::Io {
            path: self.directory.clone(),
            source,
        })
    }
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), CodecError> {
    fs::write(path, data).map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// A stale entity file from an earlier capture would read back as content.
fn write_entity(path: &Path, data: Option<&Bytes>) -> Result<(), CodecError> {
    match data {
        Some(bytes) => write_file(path, bytes),
        None => match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CodecError::Io {
                path: path.to_path_buf(),
                source,
            }),
        },
    }
}

fn read_text(path: &Path) -> Result<String, CodecError> {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8(bytes).map_err(|e| CodecError::MalformedRecording {
            path: path.to_path_buf(),
            source: FormatError::InvalidValue {
                line: 0,
                what: "UTF-8 text",
                value: e.to_string(),
            },
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(CodecError::MissingRecording(path.to_path_buf()))
        }
        Err(source) => Err(CodecError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn read_entity(path: &Path) -> Result<Option<Bytes>, CodecError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(Bytes::from(bytes))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(CodecError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
