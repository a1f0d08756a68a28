//! HTTP response serialization.
//!
//! Responses are serialized into a per-request buffer and written to the
//! socket in one pass. Every response carries permissive CORS headers and
//! `Connection: keep-alive` unless the builder is told otherwise.

/// Builder for a serialized HTTP/1.1 response.
pub struct ResponseBuilder {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// 200 with a typed body.
    pub fn ok(content_type: &str, body: Vec<u8>) -> Self {
        Self::new(200).content_type(content_type).body(body)
    }

    pub fn content_type(mut self, ct: &str) -> Self {
        self.headers.push(("Content-Type".into(), ct.into()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// `Cache-Control: no-store` (default for project files).
    pub fn no_store(self) -> Self {
        self.header("Cache-Control", "no-store")
    }

    /// `Cache-Control: max-age=86400` (module-namespace responses).
    pub fn long_cache(self) -> Self {
        self.header("Cache-Control", "max-age=86400")
    }

    /// Serialize status line, headers, and body into one buffer.
    ///
    /// `Content-Length`, CORS, and keep-alive headers are appended here so
    /// call sites cannot forget them.
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.body.len());
        out.extend_from_slice(b"HTTP/1.1 ");
        out.extend_from_slice(self.status.to_string().as_bytes());
        out.push(b' ');
        out.extend_from_slice(status_text(self.status).as_bytes());
        out.extend_from_slice(b"\r\n");

        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"Access-Control-Allow-Origin: *\r\n");
        out.extend_from_slice(b"Access-Control-Allow-Methods: GET, OPTIONS\r\n");
        out.extend_from_slice(b"Access-Control-Allow-Headers: *\r\n");
        out.extend_from_slice(b"Connection: keep-alive\r\n");
        out.extend_from_slice(b"Content-Length: ");
        out.extend_from_slice(self.body.len().to_string().as_bytes());
        out.extend_from_slice(b"\r\n\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    /// Serialize only the head, leaving the connection open for a stream
    /// (SSE). No Content-Length is written.
    pub fn finish_stream_head(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(b"HTTP/1.1 ");
        out.extend_from_slice(self.status.to_string().as_bytes());
        out.push(b' ');
        out.extend_from_slice(status_text(self.status).as_bytes());
        out.extend_from_slice(b"\r\n");
        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"Access-Control-Allow-Origin: *\r\n");
        out.extend_from_slice(b"\r\n");
        out
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        101 => "Switching Protocols",
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_response() {
        let out = ResponseBuilder::ok("text/plain; charset=utf-8", b"hello".to_vec())
            .no_store()
            .finish();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.contains("Cache-Control: no-store\r\n"));
        assert!(text.contains("Access-Control-Allow-Origin: *\r\n"));
        assert!(text.contains("Connection: keep-alive\r\n"));
        assert!(text.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn test_status_lines() {
        for (code, phrase) in [(204, "No Content"), (403, "Forbidden"), (404, "Not Found")] {
            let out = ResponseBuilder::new(code).finish();
            let text = String::from_utf8(out).unwrap();
            assert!(text.starts_with(&format!("HTTP/1.1 {code} {phrase}")));
        }
    }

    #[test]
    fn test_stream_head_has_no_length() {
        let out = ResponseBuilder::new(200)
            .content_type("text/event-stream")
            .finish_stream_head();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("Content-Length"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
