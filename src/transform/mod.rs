//! Just-in-time source transformation.
//!
//! `transform` is the always-on pass for JavaScript-family sources served to
//! the browser: TypeScript erasure (for `.ts`/`.mts`), bare-import rewriting
//! into the `/@modules/` namespace, CSS-import marking, and reload-counter
//! version stamping. JSX/TSX goes through [`jsx::compile_jsx_native`]
//! instead, which reuses these passes.

pub mod imports;
pub mod jsx;
pub mod typescript;

pub use imports::{
    is_bare_specifier, rewrite_bare_imports, rewrite_css_imports, rewrite_specifiers,
    stamp_relative_imports,
};
pub use jsx::{compile_jsx_native, translate_jsx};
pub use typescript::strip_types;

use crate::utils::path::ext_with_dot;

/// Transform a JavaScript-family source for the browser. Always returns
/// owned bytes; line count is preserved; string-literal and comment bodies
/// are never modified.
pub fn transform(source: &str, file_path: &str, reload_counter: u64) -> Vec<u8> {
    let erased;
    let src = if matches!(ext_with_dot(file_path), Some(".ts" | ".mts")) {
        erased = strip_types(source);
        erased.as_str()
    } else {
        source
    };

    let src = rewrite_bare_imports(src);
    let src = rewrite_css_imports(&src);
    let src = stamp_relative_imports(&src, reload_counter);
    src.into_bytes()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ts_file_gets_erasure_and_rewrite() {
        let src = "import { h } from 'lib';\ntype T = number;\nconst x: T = 1;\n";
        let out = String::from_utf8(transform(src, "/app/main.ts", 0)).unwrap();
        assert!(out.contains("'/@modules/lib'"));
        assert!(!out.contains("type T"));
        assert!(out.contains("const x = 1"));
        // Line count preserved through the whole pass
        assert_eq!(out.matches('\n').count(), src.matches('\n').count());
    }

    #[test]
    fn test_js_file_no_erasure() {
        let src = "const action = { type: 'x' };\nimport 'pkg';\n";
        let out = String::from_utf8(transform(src, "/app/main.js", 0)).unwrap();
        assert!(out.contains("type: 'x'"));
        assert!(out.contains("'/@modules/pkg'"));
    }

    #[test]
    fn test_css_marking_and_stamping_compose() {
        let src = "import './a.css';\nimport { b } from './b.js';\n";
        let out = String::from_utf8(transform(src, "/app/m.js", 5)).unwrap();
        // css import is marked, then exempt from stamping; plain relative
        // import is stamped
        assert!(out.contains("'./a.css?import'"));
        assert!(out.contains("'./b.js?t=5'"));
    }
}
