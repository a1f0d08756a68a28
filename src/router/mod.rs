//! Request routing across the virtual namespaces.
//!
//! The table is checked in order: HMR endpoints, the `/@modules/`
//! namespace, embedded assets, manifests, CSS-as-module, app directories,
//! and finally the shell. Paths are percent-decoded into a per-request
//! buffer before matching; anything containing `..` is rejected outright.

use crate::config::framework_color;
use crate::embed;
use crate::http::{Method, Request, ResponseBuilder};
use crate::mime;
use crate::pipeline;
use crate::server::ServerContext;
use crate::utils::path::{decode_url, has_traversal, trim_slashes};
use crate::ws;

/// What the connection task should do with this request.
pub enum RouteAction {
    /// Write the serialized response and keep the connection.
    Respond(Vec<u8>),
    /// Hand the socket to the WebSocket HMR stream (validated key inside).
    WsStream(String),
    /// Hand the socket to the SSE HMR stream.
    SseStream,
}

/// Route one parsed request.
pub fn route(req: &Request<'_>, ctx: &ServerContext) -> RouteAction {
    match req.method {
        Method::Options => {
            return RouteAction::Respond(ResponseBuilder::new(204).finish());
        }
        Method::Get | Method::Head => {}
        _ => {
            return RouteAction::Respond(
                ResponseBuilder::new(405)
                    .content_type(mime::types::PLAIN)
                    .body(b"405 Method Not Allowed".to_vec())
                    .finish(),
            );
        }
    }

    let path = decode_url(req.path);
    if has_traversal(&path) {
        return RouteAction::Respond(
            ResponseBuilder::new(403)
                .content_type(mime::types::PLAIN)
                .body(b"403 Forbidden".to_vec())
                .finish(),
        );
    }

    let action = dispatch(req, ctx, &path);
    match action {
        RouteAction::Respond(body) if req.method == Method::Head => {
            RouteAction::Respond(truncate_head(body))
        }
        other => other,
    }
}

fn dispatch(req: &Request<'_>, ctx: &ServerContext, path: &str) -> RouteAction {
    // 1-2. HMR endpoints
    if path == "/__wu_hmr" {
        return RouteAction::SseStream;
    }
    if path == "/__wu_ws"
        && let Some(key) = ws::validate_upgrade(req)
    {
        return RouteAction::WsStream(key.to_string());
    }

    // 3. Virtual module namespace
    if let Some(specifier) = path.strip_prefix("/@modules/") {
        return RouteAction::Respond(pipeline::serve_module(ctx, specifier));
    }

    // 4. Embedded HMR client
    if path == embed::CLIENT_JS_PATH {
        return RouteAction::Respond(
            ResponseBuilder::ok(mime::types::JAVASCRIPT, embed::CLIENT_JS.as_bytes().to_vec())
                .no_store()
                .finish(),
        );
    }

    // 5. Live apps manifest
    if path == "/@wu/apps.json" {
        return RouteAction::Respond(
            ResponseBuilder::ok(mime::types::JSON, pipeline::apps_json(ctx).into_bytes())
                .no_store()
                .finish(),
        );
    }

    let clean = trim_slashes(path);

    // 6. Per-app manifests
    if clean.ends_with("wu.json") && (clean == "wu.json" || clean.ends_with("/wu.json")) {
        return RouteAction::Respond(serve_manifest(ctx, clean));
    }

    // 7. CSS served as a JavaScript module
    if path.ends_with(".css") && has_import_flag(req.query) {
        return RouteAction::Respond(pipeline::serve_css_module(ctx, clean, path));
    }

    // 8. App files
    let apps = ctx.apps();
    for app in apps.iter() {
        if let Some(rest) = clean.strip_prefix(app.dir.as_str()) {
            if rest.is_empty() {
                let index = format!("{}/index.html", app.dir);
                return RouteAction::Respond(pipeline::serve_app_file(ctx, app, &index));
            }
            if rest.starts_with('/') {
                return RouteAction::Respond(pipeline::serve_app_file(ctx, app, clean));
            }
        }
    }

    // 9. Shell fallback
    RouteAction::Respond(serve_shell(ctx, clean))
}

/// `?import`, possibly alongside other query parameters.
fn has_import_flag(query: Option<&str>) -> bool {
    query.is_some_and(|q| q.split('&').any(|p| p == "import"))
}

/// Rule 6: a real `wu.json` on disk wins; otherwise synthesize one for a
/// registered app directory.
fn serve_manifest(ctx: &ServerContext, clean: &str) -> Vec<u8> {
    if ctx.root.join(clean).is_file() {
        return pipeline::serve_static(ctx, clean);
    }

    let dir = clean.trim_end_matches("wu.json").trim_end_matches('/');
    let apps = ctx.apps();
    if let Some(app) = apps.iter().find(|a| a.dir == dir) {
        let manifest = serde_json::json!({
            "name": app.name,
            "dir": app.dir,
            "framework": app.framework,
            "color": framework_color(&app.framework),
            "ext": crate::config::entry_ext(&app.framework),
        });
        return ResponseBuilder::ok(mime::types::JSON, manifest.to_string().into_bytes())
            .no_store()
            .finish();
    }

    pipeline::not_found()
}

/// Rule 9: `dist` build output first, then source, then directory
/// indexes.
fn serve_shell(ctx: &ServerContext, clean: &str) -> Vec<u8> {
    let shell = ctx.shell_dir();
    let candidates = [
        format!("{shell}/dist/{clean}"),
        format!("{shell}/{clean}"),
        format!("{shell}/dist/{clean}/index.html"),
        format!("{shell}/{clean}/index.html"),
    ];

    for candidate in candidates {
        let candidate = candidate.replace("//", "/");
        if ctx.root.join(&candidate).is_file() {
            return pipeline::serve_static(ctx, &candidate);
        }
    }
    pipeline::not_found()
}

/// HEAD: keep the full header block (including Content-Length), drop the
/// body.
fn truncate_head(response: Vec<u8>) -> Vec<u8> {
    match response.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(pos) => response[..pos + 4].to_vec(),
        None => response,
    }
}

// ============================================================================
// Tests
// ============================================================================
