//! Module and app serving pipelines.
//!
//! The router decides *which* pipeline handles a request; this module does
//! the work: disk reads, cache consultation, framework compilation,
//! transformation, CommonJS wrapping, and the synthesized error stubs that
//! turn every failure into a 200 the browser can display.

use std::path::Path;

use crate::cache::mtime_of;
use crate::cjs::{is_commonjs, wrap_commonjs};
use crate::config::AppEntry;
use crate::http::ResponseBuilder;
use crate::log;
use crate::mime;
use crate::resolver::{self, split_package};
use crate::server::ServerContext;
use crate::transform::{self, rewrite_specifiers, stamp_relative_imports};
use crate::utils::path::ext_with_dot;

/// Feature-flag substitution table, applied as whole-token replacement.
const FLAG_TABLE: [(&str, &str); 4] = [
    ("process.env.NODE_ENV", "\"development\""),
    ("__VUE_OPTIONS_API__", "true"),
    ("__VUE_PROD_DEVTOOLS__", "false"),
    ("__VUE_PROD_HYDRATION_MISMATCH_DETAILS__", "false"),
];

const JS_EXTS: [&str; 7] = [".js", ".mjs", ".cjs", ".ts", ".mts", ".jsx", ".tsx"];

// ============================================================================
// App-file pipeline
// ============================================================================

/// Serve a file beneath a registered app directory. `rel` is the decoded
/// project-relative path (e.g. `mf-header/src/main.jsx`).
pub fn serve_app_file(ctx: &ServerContext, app: &AppEntry, rel: &str) -> Vec<u8> {
    let full = ctx.root.join(rel);
    let ext = ext_with_dot(rel).unwrap_or("");

    if crate::broker::needs_framework_compile(ext, &app.framework) {
        return serve_compiled(ctx, app, rel, &full);
    }

    serve_static(ctx, rel)
}

/// Serve a non-compiled project file: transformer for the JS family, HMR
/// injection for HTML, raw bytes otherwise. Shared by the app and shell
/// pipelines.
pub fn serve_static(ctx: &ServerContext, rel: &str) -> Vec<u8> {
    let ext = ext_with_dot(rel).unwrap_or("");
    let Ok(body) = std::fs::read(ctx.root.join(rel)) else {
        return not_found();
    };

    if JS_EXTS.contains(&ext) {
        let source = String::from_utf8_lossy(&body);
        let out = transform::transform(&source, rel, ctx.channel.counter());
        return ResponseBuilder::ok(mime::types::JAVASCRIPT, out)
            .no_store()
            .finish();
    }
    if ext == ".html" {
        let injected = inject_html(ctx, &body);
        return ResponseBuilder::ok(mime::types::HTML, injected)
            .no_store()
            .finish();
    }

    ResponseBuilder::ok(mime::from_ext(ext), body)
        .no_store()
        .finish()
}

/// Broker-compiled app file, cached under `(path, mtime)`. The cache holds
/// the unstamped compile result; version stamping happens per serve.
fn serve_compiled(ctx: &ServerContext, app: &AppEntry, rel: &str, full: &Path) -> Vec<u8> {
    let path_key = full.to_string_lossy();
    let counter = ctx.channel.counter();

    let Some(mtime) = mtime_of(full) else {
        return not_found();
    };

    if let Some(body) = ctx.cache.get(&path_key, mtime) {
        return serve_stamped_js(&body, counter);
    }

    let Ok(source) = std::fs::read_to_string(full) else {
        return not_found();
    };

    match ctx.broker.compile(&source, &path_key, &app.dir, &app.framework) {
        Ok(body) => {
            ctx.cache.put(&path_key, mtime, &body);
            serve_stamped_js(&body, counter)
        }
        Err(e) => {
            log!("broker"; "compile failed for {rel}: {e}");
            error_stub(&format!("compilation of {rel} failed: {e}"))
        }
    }
}

fn serve_stamped_js(body: &[u8], counter: u64) -> Vec<u8> {
    let text = String::from_utf8_lossy(body);
    let stamped = stamp_relative_imports(&text, counter);
    ResponseBuilder::ok(mime::types::JAVASCRIPT, stamped.into_bytes())
        .no_store()
        .finish()
}

// ============================================================================
// Module pipeline
// ============================================================================

/// Serve a bare specifier from the virtual `/@modules/` namespace.
pub fn serve_module(ctx: &ServerContext, specifier: &str) -> Vec<u8> {
    let config = ctx.config();
    let dirs = config.resolve_dirs(&ctx.root);

    let resolved = match resolver::resolve(specifier, &dirs) {
        Ok(r) => r,
        Err(e) => {
            log!("resolve"; "{e}");
            return error_stub(&format!("cannot resolve \"{specifier}\": {e}"));
        }
    };

    let file = Path::new(&resolved.file_path);
    let Some(mtime) = mtime_of(file) else {
        return error_stub(&format!("resolved file vanished for \"{specifier}\""));
    };

    if let Some(body) = ctx.cache.get(&resolved.file_path, mtime) {
        return ResponseBuilder::ok(mime::types::JAVASCRIPT, body)
            .long_cache()
            .finish();
    }

    let Ok(raw) = std::fs::read_to_string(file) else {
        return error_stub(&format!("cannot read resolved file for \"{specifier}\""));
    };

    let body = if is_commonjs(&raw) {
        wrap_commonjs(&raw, &resolved.file_path)
    } else {
        prepare_esm(&raw, specifier, &resolved.file_path, &resolved.package_dir)
    };

    ctx.cache.put(&resolved.file_path, mtime, &body);
    ResponseBuilder::ok(mime::types::JAVASCRIPT, body)
        .long_cache()
        .finish()
}

/// ES-module preparation: transformer passes, relative anchoring, feature
/// flags, `#imports`.
fn prepare_esm(raw: &str, specifier: &str, file_path: &str, package_dir: &str) -> Vec<u8> {
    let (pkg_name, _) = split_package(specifier);

    let erased;
    let src = if matches!(ext_with_dot(file_path), Some(".ts" | ".mts")) {
        erased = transform::strip_types(raw);
        erased.as_str()
    } else {
        raw
    };

    let src = transform::rewrite_bare_imports(src);
    let src = transform::rewrite_css_imports(&src);

    // Relative imports resolve against the virtual URL in the browser, so
    // anchor them to the package's physical layout
    let src = rewrite_specifiers(&src, |spec| {
        if spec.starts_with("./") || spec.starts_with("../") {
            anchor_relative(spec, file_path, package_dir, pkg_name)
        } else if spec.starts_with('#') {
            resolver::resolve_hash_import(spec, Path::new(package_dir))
                .map(|rel| format!("/@modules/{pkg_name}/{rel}"))
        } else {
            None
        }
    });

    let mut out = src;
    for (token, replacement) in FLAG_TABLE {
        out = replace_token(&out, token, replacement);
    }
    out.into_bytes()
}

/// Map `./x` inside a package file to `/@modules/<pkg>/<path-in-package>`.
fn anchor_relative(
    spec: &str,
    file_path: &str,
    package_dir: &str,
    pkg_name: &str,
) -> Option<String> {
    let file_dir = Path::new(file_path).parent()?;
    let target = normalize_join(file_dir, spec);
    let inside = target.strip_prefix(Path::new(package_dir)).ok()?;
    let inside = inside.to_string_lossy().replace('\\', "/");
    Some(format!("/@modules/{pkg_name}/{inside}"))
}

/// Lexically join and collapse `.`/`..` segments (no filesystem access).
fn normalize_join(base: &Path, rel: &str) -> std::path::PathBuf {
    let mut out = base.to_path_buf();
    for part in rel.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            seg => out.push(seg),
        }
    }
    out
}

/// Whole-token replacement: the token must not be embedded in a larger
/// identifier on either side.
fn replace_token(src: &str, token: &str, replacement: &str) -> String {
    let bytes = src.as_bytes();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;
    while i < bytes.len() {
        if src[i..].starts_with(token) {
            let before_ok = i == 0 || !is_ident(bytes[i - 1]);
            let after = i + token.len();
            let after_ok = bytes.get(after).is_none_or(|&b| !is_ident(b) && b != b'.');
            if before_ok && after_ok {
                out.push_str(replacement);
                i = after;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

// ============================================================================
// CSS-as-module pipeline
// ============================================================================

/// Serve a stylesheet as a JavaScript module that installs a tagged
/// `<style>` element.
pub fn serve_css_module(ctx: &ServerContext, rel: &str, url_path: &str) -> Vec<u8> {
    let Ok(css) = std::fs::read_to_string(ctx.root.join(rel)) else {
        return not_found();
    };

    let escaped = escape_js_string(&css);
    let js = format!(
        "const css = \"{escaped}\";\n\
         let el = document.querySelector('style[data-wu-css=\"{url_path}\"]');\n\
         if (!el) {{\n\
           el = document.createElement('style');\n\
           el.setAttribute('data-wu-css', '{url_path}');\n\
           document.head.appendChild(el);\n\
         }}\n\
         el.textContent = css;\n\
         export default css;\n"
    );

    ResponseBuilder::ok(mime::types::JAVASCRIPT, js.into_bytes())
        .no_store()
        .finish()
}

fn escape_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

// ============================================================================
// HTML injection and stubs
// ============================================================================

/// Inject the HMR client and the live-apps global into an HTML body.
pub fn inject_html(ctx: &ServerContext, html: &[u8]) -> Vec<u8> {
    let apps_json = apps_json(ctx);
    let script = format!(
        "<script>window.__wu_apps = {apps_json};</script>\
         <script type=\"module\" src=\"{}\"></script>",
        crate::embed::CLIENT_JS_PATH
    );
    crate::embed::inject_into_html(html, &script)
}

/// The live-apps array served at `/@wu/apps.json` and injected into HTML.
pub fn apps_json(ctx: &ServerContext) -> String {
    let apps = ctx.apps();
    let entries: Vec<serde_json::Value> = apps
        .iter()
        .map(|a| {
            serde_json::json!({
                "name": a.name,
                "dir": a.dir,
                "framework": a.framework,
                "color": crate::config::framework_color(&a.framework),
                "ext": crate::config::entry_ext(&a.framework),
            })
        })
        .collect();
    serde_json::to_string(&entries).unwrap_or_else(|_| "[]".to_string())
}

/// 200 with a `console.error` body: the browser surfaces the message in
/// place of a failed import.
pub fn error_stub(message: &str) -> Vec<u8> {
    let js = format!("console.error(\"[wu] {}\");\n", escape_js_string(message));
    ResponseBuilder::ok(mime::types::JAVASCRIPT, js.into_bytes())
        .no_store()
        .finish()
}

pub fn not_found() -> Vec<u8> {
    ResponseBuilder::new(404)
        .content_type(mime::types::PLAIN)
        .body(b"404 Not Found".to_vec())
        .no_store()
        .finish()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use std::net::{IpAddr, Ipv4Addr};
    use tempfile::TempDir;

    fn context(tmp: &TempDir, config_json: &str) -> ServerContext {
        ServerContext::new(
            tmp.path().to_path_buf(),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            3000,
            ProjectConfig::parse(config_json).unwrap(),
        )
    }

    fn body_of(response: &[u8]) -> &[u8] {
        let pos = response
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .unwrap();
        &response[pos + 4..]
    }

    #[test]
    fn test_replace_token_boundaries() {
        let out = replace_token(
            "if (process.env.NODE_ENV === 'production') {}",
            "process.env.NODE_ENV",
            "\"development\"",
        );
        assert_eq!(out, "if (\"development\" === 'production') {}");

        // Not inside identifiers
        let out = replace_token("my_process.env.NODE_ENV_X", "process.env.NODE_ENV", "\"d\"");
        assert_eq!(out, "my_process.env.NODE_ENV_X");

        let out = replace_token("__VUE_OPTIONS_API__ ? a : b", "__VUE_OPTIONS_API__", "true");
        assert_eq!(out, "true ? a : b");
    }

    #[test]
    fn test_anchor_relative() {
        let anchored = anchor_relative(
            "./shared/utils.js",
            "/proj/node_modules/lib/esm/index.js",
            "/proj/node_modules/lib",
            "lib",
        );
        assert_eq!(
            anchored,
            Some("/@modules/lib/esm/shared/utils.js".to_string())
        );

        let up = anchor_relative(
            "../core.js",
            "/proj/node_modules/lib/esm/index.js",
            "/proj/node_modules/lib",
            "lib",
        );
        assert_eq!(up, Some("/@modules/lib/core.js".to_string()));
    }

    #[test]
    fn test_serve_module_esm() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp, "{}");
        std::fs::create_dir_all(tmp.path().join("node_modules/greet")).unwrap();
        std::fs::write(
            tmp.path().join("node_modules/greet/package.json"),
            r#"{ "main": "./index.js", "type": "module" }"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("node_modules/greet/index.js"),
            "import dep from 'other';\nimport { h } from './lib/h.js';\nexport const env = process.env.NODE_ENV;\n",
        )
        .unwrap();

        let response = serve_module(&ctx, "greet");
        let body = String::from_utf8_lossy(body_of(&response)).into_owned();
        assert!(body.contains("'/@modules/other'"));
        assert!(body.contains("'/@modules/greet/lib/h.js'"));
        assert!(body.contains("\"development\""));
        let head = String::from_utf8_lossy(&response).into_owned();
        assert!(head.contains("max-age=86400"));
    }

    #[test]
    fn test_serve_module_cjs_wrapped() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp, "{}");
        std::fs::create_dir_all(tmp.path().join("node_modules/classic")).unwrap();
        std::fs::write(
            tmp.path().join("node_modules/classic/package.json"),
            r#"{ "main": "./index.js" }"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("node_modules/classic/index.js"),
            "exports.hello = function () { return 1; };",
        )
        .unwrap();

        let response = serve_module(&ctx, "classic");
        let body = String::from_utf8_lossy(body_of(&response)).into_owned();
        assert!(body.contains("export default module.exports;"));
        assert!(body.contains("export var hello = __e.hello;"));
    }

    #[test]
    fn test_serve_module_miss_is_stub() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp, "{}");
        let response = serve_module(&ctx, "ghost-package");
        let head = String::from_utf8_lossy(&response).into_owned();
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        let body = String::from_utf8_lossy(body_of(&response)).into_owned();
        assert!(body.contains("console.error"));
        assert!(body.contains("ghost-package"));
    }

    #[test]
    fn test_serve_module_cached_after_first_hit() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp, "{}");
        std::fs::create_dir_all(tmp.path().join("node_modules/memo")).unwrap();
        std::fs::write(
            tmp.path().join("node_modules/memo/package.json"),
            r#"{ "main": "./i.js" }"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("node_modules/memo/i.js"),
            "export const a = 1;",
        )
        .unwrap();

        let first = serve_module(&ctx, "memo");
        let second = serve_module(&ctx, "memo");
        assert_eq!(body_of(&first), body_of(&second));
    }

    #[test]
    fn test_serve_app_plain_js_transformed() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(
            &tmp,
            r#"{ "apps": [ { "name": "h", "dir": "mf-h", "framework": "react" } ] }"#,
        );
        std::fs::create_dir_all(tmp.path().join("mf-h/src")).unwrap();
        std::fs::write(
            tmp.path().join("mf-h/src/util.js"),
            "import 'left-pad';\nexport const n = 1;\n",
        )
        .unwrap();

        let apps = ctx.apps();
        let response = serve_app_file(&ctx, &apps[0], "mf-h/src/util.js");
        let body = String::from_utf8_lossy(body_of(&response)).into_owned();
        assert!(body.contains("'/@modules/left-pad'"));
        let head = String::from_utf8_lossy(&response).into_owned();
        assert!(head.contains("no-store"));
    }

    #[test]
    fn test_serve_app_html_injected() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(
            &tmp,
            r#"{ "apps": [ { "name": "h", "dir": "mf-h", "framework": "react" } ] }"#,
        );
        std::fs::create_dir_all(tmp.path().join("mf-h")).unwrap();
        std::fs::write(
            tmp.path().join("mf-h/index.html"),
            "<html><head></head><body></body></html>",
        )
        .unwrap();

        let apps = ctx.apps();
        let response = serve_app_file(&ctx, &apps[0], "mf-h/index.html");
        let body = String::from_utf8_lossy(body_of(&response)).into_owned();
        assert!(body.contains("window.__wu_apps"));
        assert!(body.contains("/@wu/client.js"));
    }

    #[test]
    fn test_serve_css_module() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp, "{}");
        std::fs::create_dir_all(tmp.path().join("mf-h")).unwrap();
        std::fs::write(tmp.path().join("mf-h/a.css"), "body { color: red; }\n").unwrap();

        let response = serve_css_module(&ctx, "mf-h/a.css", "/mf-h/a.css");
        let body = String::from_utf8_lossy(body_of(&response)).into_owned();
        assert!(body.contains("data-wu-css"));
        assert!(body.contains("body { color: red; }\\n"));
        assert!(body.contains("export default css;"));
        let head = String::from_utf8_lossy(&response).into_owned();
        assert!(head.contains("text/javascript"));
    }

    #[test]
    fn test_apps_json_shape() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(
            &tmp,
            r#"{ "apps": [ { "name": "h", "dir": "mf-h", "framework": "react" } ] }"#,
        );
        let json = apps_json(&ctx);
        assert!(json.contains("\"color\":\"#61dafb\""));
        assert!(json.contains("\"ext\":\"jsx\""));
    }
}
