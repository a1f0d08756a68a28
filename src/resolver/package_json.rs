//! Lightweight package.json field extraction.
//!
//! Not a JSON parser: a brace-depth-aware scanner that skips string bodies
//! (honoring backslash escapes) and matches keys only at object depth 1
//! from the outermost `{`. package.json files are machine-written and
//! well-formed; only a handful of fields are ever needed, so a full parser
//! buys nothing here.

/// An extracted field value, borrowed from the document.
#[derive(Debug, PartialEq, Eq)]
pub enum Value<'a> {
    /// Unquoted string body.
    Str(&'a str),
    /// A `{…}` region including braces; feed back into [`extract`] for
    /// nested lookups.
    Object(&'a str),
    /// A `[…]` region including brackets.
    Array(&'a str),
    /// Number, boolean, or null, trimmed.
    Raw(&'a str),
}

impl<'a> Value<'a> {
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&'a str> {
        match self {
            Value::Object(s) => Some(s),
            _ => None,
        }
    }
}

/// Find `key` at depth 1 of the outermost object and return its value.
/// Nested keys never match.
pub fn extract<'a>(json: &'a str, key: &str) -> Option<Value<'a>> {
    let bytes = json.as_bytes();
    let mut i = 0;

    // Outermost '{'
    while i < bytes.len() && bytes[i] != b'{' {
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }
    i += 1;

    let mut depth = 1i32;
    // After '{' or ',' at depth 1 the next string is a key; after ':' it
    // is a value
    let mut at_key = true;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let (body, after) = read_string(bytes, i + 1)?;
                i = after;
                if depth == 1 && at_key && body == key.as_bytes() {
                    let colon = skip_ws(bytes, i);
                    if bytes.get(colon) == Some(&b':') {
                        return read_value(json, skip_ws(bytes, colon + 1));
                    }
                }
            }
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth -= 1;
                if depth == 0 {
                    return None;
                }
            }
            b':' if depth == 1 => at_key = false,
            b',' if depth == 1 => at_key = true,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Read the value region starting at `start`.
fn read_value(json: &str, start: usize) -> Option<Value<'_>> {
    let bytes = json.as_bytes();
    match bytes.get(start)? {
        b'"' => {
            let (body, after) = read_string(bytes, start + 1)?;
            let _ = after;
            std::str::from_utf8(body).ok().map(Value::Str)
        }
        b'{' => balanced(json, start, b'{', b'}').map(Value::Object),
        b'[' => balanced(json, start, b'[', b']').map(Value::Array),
        _ => {
            let mut end = start;
            while end < bytes.len() && !matches!(bytes[end], b',' | b'}' | b']') {
                end += 1;
            }
            Some(Value::Raw(json[start..end].trim()))
        }
    }
}

/// String body from `start` (past the opening quote) to the closing quote.
fn read_string(bytes: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some((&bytes[start..i], i + 1)),
            _ => i += 1,
        }
    }
    None
}

/// Balanced `open…close` region including delimiters, skipping strings.
fn balanced(json: &str, start: usize, open: u8, close: u8) -> Option<&str> {
    let bytes = json.as_bytes();
    let mut depth = 0i32;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let (_, after) = read_string(bytes, i + 1)?;
                i = after;
                continue;
            }
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&json[start..=i]);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

// =============================================================================
// Tests
// =============================================================================
