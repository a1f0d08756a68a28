//! URL path helpers shared by the router and pipelines.
//!
//! Pure functions, no side effects.

use std::borrow::Cow;

/// Percent-decode a request path into an owned string.
///
/// Invalid UTF-8 after decoding falls back to the raw input.
pub fn decode_url(url: &str) -> String {
    use percent_encoding::percent_decode_str;
    percent_decode_str(url)
        .decode_utf8()
        .map(Cow::into_owned)
        .unwrap_or_else(|_| url.to_string())
}

/// Split a URL into path and query at the first `?`.
pub fn split_query(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

/// File extension including the leading dot, lowercased check not applied
/// (extensions in this project are conventionally lowercase).
pub fn ext_with_dot(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rfind('.').map(|i| &name[i..])
}

/// Reject any path containing a `..` traversal sequence.
pub fn has_traversal(path: &str) -> bool {
    path.contains("..")
}

/// Trim leading and trailing slashes.
pub fn trim_slashes(path: &str) -> &str {
    path.trim_matches('/')
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_url() {
        assert_eq!(decode_url("/a%20b.js"), "/a b.js");
        assert_eq!(decode_url("/plain/path"), "/plain/path");
    }

    #[test]
    fn test_split_query() {
        assert_eq!(split_query("/x.css?import"), ("/x.css", Some("import")));
        assert_eq!(split_query("/x.css"), ("/x.css", None));
    }

    #[test]
    fn test_ext_with_dot() {
        assert_eq!(ext_with_dot("/app/main.tsx"), Some(".tsx"));
        assert_eq!(ext_with_dot("/app/no_ext"), None);
        assert_eq!(ext_with_dot("dir.v2/file"), None);
    }

    #[test]
    fn test_has_traversal() {
        assert!(has_traversal("/a/../b"));
        assert!(!has_traversal("/a/b"));
    }
}
