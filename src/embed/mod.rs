//! Embedded static resources.
//!
//! - `client.js` — the HMR client injected into HTML responses, served
//!   from memory at `/@wu/client.js`
//! - `compiler.cjs` — the compilation daemon script, written to
//!   `.wu-cache/wu-compiler.cjs` on first compile so node resolves the
//!   project's own compiler packages

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// HMR client script.
pub const CLIENT_JS: &str = include_str!("client.js");

/// Virtual path the client script is served from.
pub const CLIENT_JS_PATH: &str = "/@wu/client.js";

/// Compilation daemon script.
pub const COMPILER_CJS: &str = include_str!("compiler.cjs");

/// Daemon script filename inside the cache directory.
pub const COMPILER_FILE: &str = "wu-compiler.cjs";

/// Write the daemon script under the cache dir, returning its path.
/// Overwrites any stale copy from a previous version.
pub fn write_compiler_script(root: &Path) -> Result<PathBuf> {
    let dir = root.join(crate::cache::CACHE_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(COMPILER_FILE);
    std::fs::write(&path, COMPILER_CJS)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Inject `script` into an HTML body immediately before `</head>`, else
/// before `</body>`, else at the top.
pub fn inject_into_html(html: &[u8], script: &str) -> Vec<u8> {
    let text = String::from_utf8_lossy(html);
    let anchor = text.find("</head>").or_else(|| text.find("</body>"));
    match anchor {
        Some(pos) => {
            let mut out = Vec::with_capacity(html.len() + script.len());
            out.extend_from_slice(text[..pos].as_bytes());
            out.extend_from_slice(script.as_bytes());
            out.extend_from_slice(text[pos..].as_bytes());
            out
        }
        None => {
            let mut out = Vec::with_capacity(html.len() + script.len());
            out.extend_from_slice(script.as_bytes());
            out.extend_from_slice(html);
            out
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
