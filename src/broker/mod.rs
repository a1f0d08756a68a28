//! Compilation broker.
//!
//! Picks a compile strategy per (extension, framework): a native Rust
//! transform where one exists, the long-running daemon otherwise, and a
//! one-shot subprocess when the daemon will not spawn. Third-party
//! compilers emit bare specifiers the browser cannot resolve, so every
//! tier's output goes through bare-import rewriting before it leaves the
//! broker.

mod daemon;

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

use crate::transform::{compile_jsx_native, rewrite_bare_imports, rewrite_css_imports, strip_types};
use crate::utils::path::ext_with_dot;
use crate::{debug, log};

use daemon::{Daemon, compile_oneshot};

/// Longest file path the daemon protocol will carry.
const MAX_PATH: usize = 4096;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no compiler host available")]
    CompilerNotFound,
    #[error("compilation failed: {0}")]
    CompileFailed(String),
    #[error("path too long")]
    PathTooLong,
}

/// Does this (extension, framework) pair need the broker at all?
/// Everything else is served through the plain transformer.
pub fn needs_framework_compile(ext: &str, framework: &str) -> bool {
    match ext {
        ".jsx" | ".tsx" | ".svelte" | ".vue" => true,
        ".ts" => framework == "angular",
        _ => false,
    }
}

pub struct Broker {
    root: PathBuf,
    daemon: Mutex<Option<Daemon>>,
    script: Mutex<Option<PathBuf>>,
}

impl Broker {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            daemon: Mutex::new(None),
            script: Mutex::new(None),
        }
    }

    /// Compile a framework source. `file_path` is the on-disk path,
    /// `app_dir` the owning app directory (the daemon's resolution hint).
    pub fn compile(
        &self,
        source: &str,
        file_path: &str,
        app_dir: &str,
        framework: &str,
    ) -> Result<Vec<u8>, CompileError> {
        if file_path.len() > MAX_PATH {
            return Err(CompileError::PathTooLong);
        }
        let ext = ext_with_dot(file_path).unwrap_or("");

        // Tier 1: native transforms
        match (ext, framework) {
            (".jsx" | ".tsx", "react" | "preact") => {
                let out = compile_jsx_native(source, framework, ext == ".tsx");
                return Ok(finish(out));
            }
            (".ts", fw) if fw != "angular" => {
                return Ok(finish(strip_types(source).into_bytes()));
            }
            _ => {}
        }

        let kind = match (ext, framework) {
            (".jsx" | ".tsx", "solid") => "solid",
            (".jsx" | ".tsx", "qwik") => "qwik",
            (".jsx" | ".tsx", _) => "jsx",
            (".svelte", _) => "svelte",
            (".vue", _) => "vue",
            (".ts", _) => "angular",
            _ => return Err(CompileError::CompileFailed(format!("no strategy for {ext}"))),
        };
        let loader = match ext {
            ".tsx" => "tsx",
            ".ts" => "ts",
            _ => "jsx",
        };

        let out = self.compile_external(kind, file_path, loader, app_dir, source.as_bytes())?;
        Ok(finish(out))
    }

    /// Tier 2 with tier-3 fallback.
    fn compile_external(
        &self,
        kind: &str,
        filename: &str,
        loader: &str,
        app_dir: &str,
        source: &[u8],
    ) -> Result<Vec<u8>, CompileError> {
        let script = self.ensure_script()?;

        let mut guard = self.daemon.lock();

        if guard.is_none() {
            match Daemon::spawn(&script, &self.root) {
                Ok(d) => *guard = Some(d),
                Err(e) => {
                    // Tier 3: per-compile subprocess
                    debug!("broker"; "daemon spawn failed ({e}), trying one-shot");
                    return compile_oneshot(&script, &self.root, kind, filename, loader, source)
                        .map_err(|e| {
                            if e.to_string().contains("failed to spawn") {
                                CompileError::CompilerNotFound
                            } else {
                                CompileError::CompileFailed(e.to_string())
                            }
                        });
                }
            }
        }

        let result = guard
            .as_mut()
            .unwrap()
            .compile(kind, filename, loader, app_dir, source);

        match result {
            Ok(body) => Ok(body),
            Err(e) => {
                // Any failure poisons the daemon; next request respawns
                log!("broker"; "daemon error: {e}");
                if let Some(mut d) = guard.take() {
                    d.terminate();
                }
                Err(CompileError::CompileFailed(e.to_string()))
            }
        }
    }

    /// Write the embedded daemon script on first use.
    fn ensure_script(&self) -> Result<PathBuf, CompileError> {
        let mut guard = self.script.lock();
        if let Some(path) = guard.as_ref() {
            return Ok(path.clone());
        }
        let path = crate::embed::write_compiler_script(&self.root)
            .map_err(|e| CompileError::CompileFailed(e.to_string()))?;
        *guard = Some(path.clone());
        Ok(path)
    }

    /// Kill the daemon (shutdown path).
    pub fn terminate(&self) {
        if let Some(mut d) = self.daemon.lock().take() {
            d.terminate();
        }
    }
}

/// Shared tail applied to every tier's output.
fn finish(out: Vec<u8>) -> Vec<u8> {
    let text = String::from_utf8_lossy(&out);
    let text = rewrite_bare_imports(&text);
    let text = rewrite_css_imports(&text);
    text.into_bytes()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_table() {
        assert!(needs_framework_compile(".jsx", "react"));
        assert!(needs_framework_compile(".tsx", "solid"));
        assert!(needs_framework_compile(".svelte", "svelte"));
        assert!(needs_framework_compile(".vue", "vue"));
        assert!(needs_framework_compile(".ts", "angular"));
        assert!(!needs_framework_compile(".ts", "react"));
        assert!(!needs_framework_compile(".js", "react"));
        assert!(!needs_framework_compile(".css", "vue"));
    }

    #[test]
    fn test_native_jsx_tier() {
        let tmp = tempfile::TempDir::new().unwrap();
        let broker = Broker::new(tmp.path());
        let out = broker
            .compile("export default () => <div />;", "/app/x.jsx", "app", "react")
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        // Preamble present and its bare import already rewritten
        assert!(text.contains("'/@modules/react'"));
        assert!(text.contains("__jsx(\"div\", null)"));
    }

    #[test]
    fn test_native_ts_tier() {
        let tmp = tempfile::TempDir::new().unwrap();
        let broker = Broker::new(tmp.path());
        let out = broker
            .compile("const x: number = 1;\nimport 'lib';", "/app/x.ts", "app", "vue")
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("const x = 1;"));
        assert!(text.contains("'/@modules/lib'"));
    }

    #[test]
    fn test_path_too_long() {
        let tmp = tempfile::TempDir::new().unwrap();
        let broker = Broker::new(tmp.path());
        let long = format!("/{}.jsx", "a".repeat(MAX_PATH));
        assert!(matches!(
            broker.compile("x", &long, "app", "react"),
            Err(CompileError::PathTooLong)
        ));
    }
}
