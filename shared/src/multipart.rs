//! `multipart/form-data` request bodies (RFC 7578).
//!
//! The shell's HTTP client sends whatever bytes the core hands it, so the
//! form is encoded here rather than by a platform form-data API.

use uuid::Uuid;

pub const CONTENT_TYPE: &str = "multipart/form-data";

const CRLF: &[u8] = b"\r\n";

#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            boundary: format!("sod-boundary-{}", Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    #[cfg(test)]
    fn with_boundary(boundary: &str) -> Self {
        Self {
            boundary: boundary.to_string(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("{CONTENT_TYPE}; boundary={}", self.boundary)
    }

    #[must_use]
    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.open_part();
        self.body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
                escape_quoted(name),
                escape_quoted(file_name)
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(CRLF);
        self.body
            .extend_from_slice(format!("Content-Type: {content_type}").as_bytes());
        self.body.extend_from_slice(CRLF);
        self.body.extend_from_slice(CRLF);
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(CRLF);
        self
    }

    /// Closes the form and returns the encoded body.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.body.extend_from_slice(b"--");
        self.body.extend_from_slice(self.boundary.as_bytes());
        self.body.extend_from_slice(b"--");
        self.body.extend_from_slice(CRLF);
        self.body
    }

    fn open_part(&mut self) {
        self.body.extend_from_slice(b"--");
        self.body.extend_from_slice(self.boundary.as_bytes());
        self.body.extend_from_slice(CRLF);
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

// Same escaping browsers apply to names and filenames in form-data.
fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("%22"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            other => escaped.push(other),
        }
    }
    escaped
}
