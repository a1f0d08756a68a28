//! CommonJS-to-ES wrapping.
//!
//! npm still ships plenty of synchronous-`require` modules; the browser
//! only speaks ES modules. The wrapper hoists bare requires into static
//! imports, shims `process`/`global`/`module`/`exports`, replays `require`
//! through a lookup cascade, and re-exports both the default and every
//! `exports.NAME` assignment it can find.

use std::path::Path;

use rustc_hash::FxHashSet;

/// CommonJS detection: no top-level `import`/`export`, and at least one
/// require/exports marker.
pub fn is_commonjs(source: &str) -> bool {
    let has_esm = source.lines().any(|l| {
        let t = l.trim_start();
        starts_with_word(t, "import") || starts_with_word(t, "export")
    });
    if has_esm {
        return false;
    }
    source.contains("require(") || source.contains("module.exports") || source.contains("exports.")
}

/// Wrap a CommonJS source as an ES module. `file_path` locates relative
/// requires for development-variant inlining.
pub fn wrap_commonjs(source: &str, file_path: &str) -> Vec<u8> {
    // Collapse the `if (prod) require('./x.prod') else require('./x.dev')`
    // indirection: when the body requires relative files, serve the
    // development variant's source instead of evaluating the conditional.
    let inlined;
    let body = match pick_relative_require(source) {
        Some(rel) => match read_relative(file_path, &rel) {
            Some(text) => {
                inlined = text;
                inlined.as_str()
            }
            None => source,
        },
        None => source,
    };

    let deps = collect_bare_requires(body);
    let named = collect_named_exports(body);

    let mut out = String::with_capacity(body.len() + 512);

    for (n, dep) in deps.iter().enumerate() {
        out.push_str(&format!("import __dep{n} from '/@modules/{dep}';\n"));
    }

    out.push_str("var process = { env: { NODE_ENV: \"development\" } };\n");
    out.push_str("var global = globalThis;\n");
    out.push_str("var module = { exports: {} };\n");
    out.push_str("var exports = module.exports;\n");

    out.push_str("function require(id) {\n");
    for (n, dep) in deps.iter().enumerate() {
        out.push_str(&format!("  if (id === '{dep}') return __dep{n};\n"));
    }
    out.push_str("  console.warn('[wu] unresolved require:', id);\n  return {};\n}\n");

    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }

    out.push_str("export default module.exports;\n");

    if !named.is_empty() {
        out.push_str("var __e = module.exports; export var ");
        for (i, name) in named.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&format!("{name} = __e.{name}"));
        }
        out.push_str(";\n");
    }

    out.into_bytes()
}

// =============================================================================
// Require scanning
// =============================================================================

/// All specifiers passed to `require('…')`, in order of appearance.
fn collect_requires(source: &str) -> Vec<String> {
    let bytes = source.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                continue;
            }
            b'r' if at_word(bytes, i, b"require") => {
                let mut j = skip_ws(bytes, i + 7);
                if bytes.get(j) == Some(&b'(') {
                    j = skip_ws(bytes, j + 1);
                    if let Some(&q @ (b'"' | b'\'')) = bytes.get(j) {
                        let start = j + 1;
                        let mut k = start;
                        while k < bytes.len() && bytes[k] != q {
                            k += 1;
                        }
                        if let Ok(spec) = std::str::from_utf8(&bytes[start..k]) {
                            found.push(spec.to_string());
                        }
                        i = k + 1;
                        continue;
                    }
                }
                i += 7;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    found
}

/// The relative require to inline: prefer a path containing `development`,
/// else the first relative one.
fn pick_relative_require(source: &str) -> Option<String> {
    let relative: Vec<String> = collect_requires(source)
        .into_iter()
        .filter(|s| s.starts_with("./") || s.starts_with("../"))
        .collect();
    relative
        .iter()
        .find(|s| s.contains("development"))
        .or_else(|| relative.first())
        .cloned()
}

/// Deduplicated bare requires, in first-appearance order.
fn collect_bare_requires(source: &str) -> Vec<String> {
    let mut seen = FxHashSet::default();
    collect_requires(source)
        .into_iter()
        .filter(|s| !s.starts_with('.') && !s.starts_with('/'))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

fn read_relative(file_path: &str, rel: &str) -> Option<String> {
    let dir = Path::new(file_path).parent()?;
    let base = dir.join(rel);
    for candidate in [
        base.clone(),
        base.with_extension("js"),
        base.join("index.js"),
    ] {
        if candidate.is_file() {
            return std::fs::read_to_string(candidate).ok();
        }
    }
    None
}

// =============================================================================
// Named-export scanning
// =============================================================================

/// `exports.NAME = …` assignments, word-boundary-aware, deduplicated.
/// Underscore-prefixed names and `__esModule` are skipped.
fn collect_named_exports(source: &str) -> Vec<String> {
    let bytes = source.as_bytes();
    let mut seen = FxHashSet::default();
    let mut names = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'e' if at_word(bytes, i, b"exports") || at_module_exports(bytes, i) => {
                let mut j = i + 7;
                if bytes.get(j) == Some(&b'.') {
                    j += 1;
                    let start = j;
                    while j < bytes.len() && is_ident(bytes[j]) {
                        j += 1;
                    }
                    let name = &source[start..j];
                    let after = skip_ws(bytes, j);
                    let assigned = bytes.get(after) == Some(&b'=')
                        && bytes.get(after + 1) != Some(&b'=');
                    if assigned
                        && !name.is_empty()
                        && !name.starts_with('_')
                        && seen.insert(name.to_string())
                    {
                        names.push(name.to_string());
                    }
                    i = j;
                    continue;
                }
                i = j;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    names
}

// =============================================================================
// Byte helpers
// =============================================================================

fn at_word(bytes: &[u8], i: usize, word: &[u8]) -> bool {
    bytes[i..].starts_with(word)
        && (i == 0 || !is_ident(bytes[i - 1]) && bytes[i - 1] != b'.')
        && bytes.get(i + word.len()).is_none_or(|&b| !is_ident(b))
}

/// `module.exports.NAME` assignments count as named exports too; other
/// `x.exports` member accesses do not.
fn at_module_exports(bytes: &[u8], i: usize) -> bool {
    bytes[i..].starts_with(b"exports")
        && i >= 7
        && &bytes[i - 7..i] == b"module."
        && (i == 7 || !is_ident(bytes[i - 8]))
        && bytes.get(i + 7).is_none_or(|&b| !is_ident(b))
}

fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    i
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

fn starts_with_word(s: &str, word: &str) -> bool {
    s.starts_with(word)
        && s[word.len()..]
            .chars()
            .next()
            .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection() {
        assert!(is_commonjs("const x = require('react');\nmodule.exports = x;"));
        assert!(is_commonjs("exports.foo = 1;"));
        assert!(!is_commonjs("import x from 'react';\nexport default x;"));
        assert!(!is_commonjs("const plain = 1;"));
        // `importantly` is not the import keyword
        assert!(is_commonjs("importantly(require('x'));"));
    }

    #[test]
    fn test_basic_wrap() {
        let src = "const React = require('react');\nmodule.exports = { React };";
        let out = String::from_utf8(wrap_commonjs(src, "/tmp/pkg/index.js")).unwrap();
        assert!(out.contains("import __dep0 from '/@modules/react';"));
        assert!(out.contains("var process = { env: { NODE_ENV: \"development\" } };"));
        assert!(out.contains("var global = globalThis;"));
        assert!(out.contains("if (id === 'react') return __dep0;"));
        assert!(out.contains("export default module.exports;"));
    }

    #[test]
    fn test_deps_deduplicated() {
        let src = "require('a'); require('b'); require('a');";
        let out = String::from_utf8(wrap_commonjs(src, "/tmp/x.js")).unwrap();
        assert_eq!(out.matches("from '/@modules/a'").count(), 1);
        assert!(out.contains("__dep1 from '/@modules/b'"));
    }

    #[test]
    fn test_named_exports() {
        let src = "exports.render = fn;\nexports.hydrate = fn;\nexports.render = fn2;\nexports._internal = x;\nexports.__esModule = true;";
        let out = String::from_utf8(wrap_commonjs(src, "/tmp/x.js")).unwrap();
        assert!(out.contains("export var render = __e.render, hydrate = __e.hydrate;"));
        assert!(!out.contains("_internal ="));
        assert!(!out.contains("__esModule = __e"));
    }

    #[test]
    fn test_module_exports_named_assignment() {
        let src = "module.exports.start = fn;\nother.exports.skip = 1;";
        let out = String::from_utf8(wrap_commonjs(src, "/tmp/x.js")).unwrap();
        assert!(out.contains("export var start = __e.start;"));
        assert!(!out.contains("skip = __e"));
    }

    #[test]
    fn test_exports_comparison_not_an_export() {
        let src = "if (exports.ready === true) { run(); }\nexports.go = 1;";
        let out = String::from_utf8(wrap_commonjs(src, "/tmp/x.js")).unwrap();
        assert!(out.contains("export var go = __e.go;"));
        assert!(!out.contains("ready = __e"));
    }

    #[test]
    fn test_require_in_string_ignored() {
        let src = "const s = \"require('fake')\";\nmodule.exports = s;";
        let out = String::from_utf8(wrap_commonjs(src, "/tmp/x.js")).unwrap();
        assert!(!out.contains("/@modules/fake"));
    }

    #[test]
    fn test_development_variant_inlined() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("lib.development.js"),
            "exports.mode = 'dev';",
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("lib.production.js"),
            "exports.mode = 'prod';",
        )
        .unwrap();
        let entry = tmp.path().join("index.js");
        let src = "if (process.env.NODE_ENV === 'production') {\n  module.exports = require('./lib.production.js');\n} else {\n  module.exports = require('./lib.development.js');\n}";
        std::fs::write(&entry, src).unwrap();

        let out =
            String::from_utf8(wrap_commonjs(src, entry.to_str().unwrap())).unwrap();
        assert!(out.contains("exports.mode = 'dev';"));
        assert!(!out.contains("require('./lib.production.js')"));
        assert!(out.contains("export var mode = __e.mode;"));
    }

    #[test]
    fn test_scoped_package_require() {
        let src = "const core = require('@scope/core');\nmodule.exports = core;";
        let out = String::from_utf8(wrap_commonjs(src, "/tmp/x.js")).unwrap();
        assert!(out.contains("from '/@modules/@scope/core'"));
    }
}
