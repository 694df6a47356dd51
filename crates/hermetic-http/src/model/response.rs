use bytes::Bytes;

/// HTTP response as declared by a test or read from a recording.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Response {
    status: u16,
    content_type: Option<String>,
    content: Option<Bytes>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            content: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<Bytes>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }
}
