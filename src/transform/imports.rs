//! Import-specifier rewriting.
//!
//! One scanner drives three rewrites: bare specifiers to `/@modules/…`,
//! `.css` specifiers to `…?import`, and relative specifiers to
//! `…?t=<counter>` for cache busting after a reload. The scanner only fires
//! on `from`/`import` keywords in code position, so string-literal bodies
//! and comments are never rewritten.

/// Rewrite bare specifiers to the virtual module namespace.
pub fn rewrite_bare_imports(source: &str) -> String {
    rewrite_specifiers(source, |spec| {
        is_bare_specifier(spec).then(|| format!("/@modules/{spec}"))
    })
}

/// Append `?import` to `.css` specifiers so the router serves them as
/// JavaScript modules. Idempotent: a specifier already marked no longer
/// ends in `.css`.
pub fn rewrite_css_imports(source: &str) -> String {
    rewrite_specifiers(source, |spec| {
        spec.ends_with(".css").then(|| format!("{spec}?import"))
    })
}

/// Append `?t=<counter>` to relative specifiers that carry no query yet.
/// Busts the browser's ES-module cache after a hot reload; a zero counter
/// (no reload yet) leaves the source untouched.
pub fn stamp_relative_imports(source: &str, counter: u64) -> String {
    if counter == 0 {
        return source.to_string();
    }
    rewrite_specifiers(source, |spec| {
        ((spec.starts_with("./") || spec.starts_with("../")) && !spec.contains('?'))
            .then(|| format!("{spec}?t={counter}"))
    })
}

/// A specifier is bare iff it starts with an alphabetic character, `@`, or
/// `_`, is not relative/absolute/URL, and contains no whitespace or
/// bracket characters.
pub fn is_bare_specifier(spec: &str) -> bool {
    let Some(first) = spec.chars().next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '@' || first == '_') {
        return false;
    }
    if spec.starts_with('.')
        || spec.starts_with('/')
        || spec.starts_with("http:")
        || spec.starts_with("https:")
        || spec.starts_with("data:")
    {
        return false;
    }
    !spec
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '[' | ']' | '{' | '}' | '(' | ')' | '<' | '>'))
}

// =============================================================================
// Scanner
// =============================================================================

/// Walk `source` looking for `from`/`import` keywords at word boundaries
/// followed (with optional whitespace, or `(` for dynamic imports) by a
/// string literal, and apply `map` to each specifier.
pub fn rewrite_specifiers<F>(source: &str, map: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len() + 64);
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' | b'\'' | b'`' => {
                i = copy_string(bytes, i, &mut out);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = line_end(bytes, i);
                out.push_str(&source[i..end]);
                i = end;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = block_end(bytes, i);
                out.push_str(&source[i..end]);
                i = end;
                continue;
            }
            _ => {}
        }

        if is_ident(b) && !prev_is_ident(&out) {
            let word_end = i + ident_len(&bytes[i..]);
            let word = &source[i..word_end];
            // `.from(...)` member calls are not the keyword
            if (word == "from" || word == "import") && !out.ends_with('.') {
                out.push_str(word);
                i = word_end;

                // `import(` dynamic form: step inside the parenthesis
                let mut j = skip_ws(bytes, i);
                if word == "import" && bytes.get(j) == Some(&b'(') {
                    out.push_str(&source[i..=j]);
                    i = j + 1;
                    j = skip_ws(bytes, i);
                }

                if matches!(bytes.get(j), Some(b'"' | b'\'')) {
                    out.push_str(&source[i..j]);
                    let quote = bytes[j];
                    let (spec, after) = read_literal(bytes, j + 1, quote);
                    out.push(quote as char);
                    match map(spec) {
                        Some(mapped) => out.push_str(&mapped),
                        None => out.push_str(spec),
                    }
                    out.push(quote as char);
                    i = after;
                }
                continue;
            }
            out.push_str(word);
            i = word_end;
            continue;
        }

        out.push(b as char);
        i += 1;
    }

    out
}

/// Read a string literal body, returning the specifier and the index after
/// the closing quote.
fn read_literal(bytes: &[u8], start: usize, quote: u8) -> (&str, usize) {
    let mut i = start;
    while i < bytes.len() && bytes[i] != quote {
        if bytes[i] == b'\\' {
            i += 1;
        }
        i += 1;
    }
    let spec = std::str::from_utf8(&bytes[start..i.min(bytes.len())]).unwrap_or("");
    (spec, (i + 1).min(bytes.len()))
}

fn copy_string(bytes: &[u8], start: usize, out: &mut String) -> usize {
    let quote = bytes[start];
    out.push(quote as char);
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        out.push(b as char);
        if b == b'\\' && i + 1 < bytes.len() {
            out.push(bytes[i + 1] as char);
            i += 2;
            continue;
        }
        i += 1;
        if b == quote {
            break;
        }
    }
    i
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| from + p)
}

fn block_end(bytes: &[u8], from: usize) -> usize {
    let mut i = from + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn prev_is_ident(out: &str) -> bool {
    matches!(out.chars().last(), Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn ident_len(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|&&b| is_ident(b)).count()
}

// =============================================================================
// Tests
// =============================================================================
