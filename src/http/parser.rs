//! Zero-copy HTTP/1.1 request parser.
//!
//! Parses a single pipelined request from a byte slice. Path and header
//! scanning work on 16-byte chunks with a scalar tail, which the compiler
//! lowers to SIMD compares on x86_64 and aarch64.

use thiserror::Error;

/// Maximum number of headers accepted per request.
const MAX_HEADERS: usize = 64;

/// Parse failure kinds.
///
/// `Incomplete` means the buffer ends before the request does; the caller
/// should read more bytes and retry. Everything else is a client protocol
/// error answered with a 4xx response.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("incomplete request")]
    Incomplete,
    #[error("invalid method")]
    InvalidMethod,
    #[error("invalid path")]
    InvalidPath,
    #[error("invalid version")]
    InvalidVersion,
    #[error("invalid header")]
    InvalidHeader,
    #[error("too many headers")]
    TooManyHeaders,
}

/// Request methods (the usual nine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

/// A parsed request. All strings borrow from the input buffer.
#[derive(Debug, PartialEq)]
pub struct Request<'a> {
    pub method: Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    /// Minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    pub minor_version: u8,
    pub headers: Vec<(&'a str, &'a str)>,
    pub body: &'a [u8],
    /// Offset of the byte after the terminating CRLFCRLF (start of body).
    pub head_len: usize,
}

impl<'a> Request<'a> {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    /// Declared body length, if any.
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }

    /// Total bytes this request occupies in the buffer (head + declared body).
    pub fn total_len(&self) -> usize {
        self.head_len + self.content_length().unwrap_or(0)
    }
}

/// Parse one request from `buf`.
pub fn parse(buf: &[u8]) -> Result<Request<'_>, ParseError> {
    let mut pos = 0;

    let method = parse_method(buf, &mut pos)?;
    let (path, query) = parse_path(buf, &mut pos)?;
    let minor_version = parse_version(buf, &mut pos)?;
    let headers = parse_headers(buf, &mut pos)?;

    let head_len = pos;
    let body_len = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    if buf.len() < head_len + body_len {
        return Err(ParseError::Incomplete);
    }
    let body = &buf[head_len..head_len + body_len];

    Ok(Request {
        method,
        path,
        query,
        minor_version,
        headers,
        body,
        head_len,
    })
}

// =============================================================================
// Request line
// =============================================================================

/// Method lexer indexed by token length.
fn parse_method(buf: &[u8], pos: &mut usize) -> Result<Method, ParseError> {
    let sp = find_byte(buf, b' ').ok_or(if buf.len() > 8 {
        ParseError::InvalidMethod
    } else {
        ParseError::Incomplete
    })?;

    let method = match &buf[..sp] {
        b"GET" => Method::Get,
        b"PUT" => Method::Put,
        b"HEAD" => Method::Head,
        b"POST" => Method::Post,
        b"TRACE" => Method::Trace,
        b"PATCH" => Method::Patch,
        b"DELETE" => Method::Delete,
        b"OPTIONS" => Method::Options,
        b"CONNECT" => Method::Connect,
        _ => return Err(ParseError::InvalidMethod),
    };
    *pos = sp + 1;
    Ok(method)
}

/// Scan the path up to `{space, '?'}`; when `?` comes first, a second scan
/// finds the terminating space to delimit the query.
fn parse_path<'a>(buf: &'a [u8], pos: &mut usize) -> Result<(&'a str, Option<&'a str>), ParseError> {
    let rest = &buf[*pos..];
    let delim = find_byte2(rest, b' ', b'?').ok_or(ParseError::Incomplete)?;

    if rest[delim] == b' ' {
        let path = as_str(&rest[..delim]).ok_or(ParseError::InvalidPath)?;
        if path.is_empty() {
            return Err(ParseError::InvalidPath);
        }
        *pos += delim + 1;
        return Ok((path, None));
    }

    // '?' first: find the space that ends the query
    let path = as_str(&rest[..delim]).ok_or(ParseError::InvalidPath)?;
    if path.is_empty() {
        return Err(ParseError::InvalidPath);
    }
    let after = &rest[delim + 1..];
    let sp = find_byte(after, b' ').ok_or(ParseError::Incomplete)?;
    let query = as_str(&after[..sp]).ok_or(ParseError::InvalidPath)?;
    *pos += delim + 1 + sp + 1;
    Ok((path, Some(query)))
}

fn parse_version(buf: &[u8], pos: &mut usize) -> Result<u8, ParseError> {
    let rest = &buf[*pos..];
    if rest.len() < 10 {
        return Err(ParseError::Incomplete);
    }
    let minor = match &rest[..8] {
        b"HTTP/1.1" => 1,
        b"HTTP/1.0" => 0,
        _ => return Err(ParseError::InvalidVersion),
    };
    if &rest[8..10] != b"\r\n" {
        return Err(ParseError::InvalidVersion);
    }
    *pos += 10;
    Ok(minor)
}

// =============================================================================
// Headers
// =============================================================================

/// Parse header lines up to the blank line. Names and values are trimmed of
/// horizontal whitespace.
fn parse_headers<'a>(
    buf: &'a [u8],
    pos: &mut usize,
) -> Result<Vec<(&'a str, &'a str)>, ParseError> {
    let mut headers = Vec::new();

    loop {
        let rest = &buf[*pos..];
        if rest.is_empty() {
            return Err(ParseError::Incomplete);
        }

        // Blank line terminates the header block
        if rest[0] == b'\r' {
            if rest.len() < 2 {
                return Err(ParseError::Incomplete);
            }
            if rest[1] != b'\n' {
                return Err(ParseError::InvalidHeader);
            }
            *pos += 2;
            return Ok(headers);
        }

        if headers.len() == MAX_HEADERS {
            return Err(ParseError::TooManyHeaders);
        }

        // Locate the CR that ends this line, confirmed by the following LF
        let cr = find_byte(rest, b'\r').ok_or(ParseError::Incomplete)?;
        if cr + 1 >= rest.len() {
            return Err(ParseError::Incomplete);
        }
        if rest[cr + 1] != b'\n' {
            return Err(ParseError::InvalidHeader);
        }
        let line = &rest[..cr];

        let colon = find_byte(line, b':').ok_or(ParseError::InvalidHeader)?;
        let name = trim_ws(&line[..colon]);
        let value = trim_ws(&line[colon + 1..]);
        if name.is_empty() {
            return Err(ParseError::InvalidHeader);
        }
        let name = as_str(name).ok_or(ParseError::InvalidHeader)?;
        let value = as_str(value).ok_or(ParseError::InvalidHeader)?;

        headers.push((name, value));
        *pos += cr + 2;
    }
}

// =============================================================================
// Byte scanning
// =============================================================================

const LANE: usize = 16;

/// Position of the first occurrence of `needle`, scanning 16 bytes at a
/// time with a scalar tail.
fn find_byte(haystack: &[u8], needle: u8) -> Option<usize> {
    let mut chunks = haystack.chunks_exact(LANE);
    let mut base = 0;
    for chunk in &mut chunks {
        for (i, &b) in chunk.iter().enumerate() {
            if b == needle {
                return Some(base + i);
            }
        }
        base += LANE;
    }
    chunks
        .remainder()
        .iter()
        .position(|&b| b == needle)
        .map(|i| base + i)
}

/// Position of the first occurrence of either needle.
fn find_byte2(haystack: &[u8], a: u8, b: u8) -> Option<usize> {
    let mut chunks = haystack.chunks_exact(LANE);
    let mut base = 0;
    for chunk in &mut chunks {
        for (i, &c) in chunk.iter().enumerate() {
            if c == a || c == b {
                return Some(base + i);
            }
        }
        base += LANE;
    }
    chunks
        .remainder()
        .iter()
        .position(|&c| c == a || c == b)
        .map(|i| base + i)
}

fn trim_ws(mut s: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = s {
        s = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = s {
        s = rest;
    }
    s
}

fn as_str(bytes: &[u8]) -> Option<&str> {
    std::str::from_utf8(bytes).ok()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_get() {
        let req = parse(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "/index.html");
        assert_eq!(req.query, None);
        assert_eq!(req.minor_version, 1);
        assert_eq!(req.header("host"), Some("localhost"));
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_query_split() {
        let req = parse(b"GET /style.css?import HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/style.css");
        assert_eq!(req.query, Some("import"));
    }

    #[test]
    fn test_slices_are_subslices_of_input() {
        // Parsed strings are byte-equal subslices of the original
        let raw = b"GET /a/b?x=1 HTTP/1.1\r\nX-One:  spaced \r\nX-Two:v\r\n\r\n";
        let req = parse(raw).unwrap();
        let base = raw.as_ptr() as usize;
        let end = base + raw.len();
        for s in [req.path, req.query.unwrap()] {
            let p = s.as_ptr() as usize;
            assert!(p >= base && p + s.len() <= end);
        }
        assert_eq!(req.header("x-one"), Some("spaced"));
        assert_eq!(req.header("X-TWO"), Some("v"));
    }

    #[test]
    fn test_all_nine_methods() {
        for (m, v) in [
            ("GET", Method::Get),
            ("HEAD", Method::Head),
            ("POST", Method::Post),
            ("PUT", Method::Put),
            ("DELETE", Method::Delete),
            ("CONNECT", Method::Connect),
            ("OPTIONS", Method::Options),
            ("TRACE", Method::Trace),
            ("PATCH", Method::Patch),
        ] {
            let raw = format!("{m} / HTTP/1.1\r\n\r\n");
            assert_eq!(parse(raw.as_bytes()).unwrap().method, v);
        }
    }

    #[test]
    fn test_invalid_method() {
        assert_eq!(
            parse(b"BREW /coffee HTTP/1.1\r\n\r\n"),
            Err(ParseError::InvalidMethod)
        );
    }

    #[test]
    fn test_invalid_version() {
        assert_eq!(
            parse(b"GET / HTTP/2.0\r\n\r\n"),
            Err(ParseError::InvalidVersion)
        );
        let req = parse(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(req.minor_version, 0);
    }

    #[test]
    fn test_incomplete() {
        assert_eq!(parse(b"GET / HT"), Err(ParseError::Incomplete));
        assert_eq!(
            parse(b"GET / HTTP/1.1\r\nHost: x\r\n"),
            Err(ParseError::Incomplete)
        );
    }

    #[test]
    fn test_incomplete_body() {
        let raw = b"POST /x HTTP/1.1\r\nContent-Length: 5\r\n\r\nab";
        assert_eq!(parse(raw), Err(ParseError::Incomplete));
        let raw = b"POST /x HTTP/1.1\r\nContent-Length: 5\r\n\r\nabcde";
        let req = parse(raw).unwrap();
        assert_eq!(req.body, b"abcde");
        assert_eq!(req.total_len(), raw.len());
    }

    #[test]
    fn test_too_many_headers() {
        let mut raw = String::from("GET / HTTP/1.1\r\n");
        for i in 0..65 {
            raw.push_str(&format!("X-H{i}: v\r\n"));
        }
        raw.push_str("\r\n");
        assert_eq!(parse(raw.as_bytes()), Err(ParseError::TooManyHeaders));
    }

    #[test]
    fn test_header_without_colon() {
        assert_eq!(
            parse(b"GET / HTTP/1.1\r\nBogusLine\r\n\r\n"),
            Err(ParseError::InvalidHeader)
        );
    }

    #[test]
    fn test_long_path_crosses_lane_boundary() {
        let path = format!("/{}", "a".repeat(50));
        let raw = format!("GET {path} HTTP/1.1\r\n\r\n");
        let req = parse(raw.as_bytes()).unwrap();
        assert_eq!(req.path, path);
    }
}
