//! MIME type registry.
//!
//! Maps file extensions (with leading dot) to Content-Type strings. The
//! whole JavaScript family — including TypeScript and component sources that
//! are compiled before serving — is reported as JavaScript, since by the
//! time a body reaches the browser it is always JS.

/// Common MIME type constants.
pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const JSON: &str = "application/json";
    pub const XML: &str = "application/xml";
    pub const CSV: &str = "text/csv; charset=utf-8";
    pub const EVENT_STREAM: &str = "text/event-stream";

    pub const SVG: &str = "image/svg+xml";
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const AVIF: &str = "image/avif";
    pub const ICO: &str = "image/x-icon";

    pub const MP3: &str = "audio/mpeg";
    pub const WAV: &str = "audio/wav";
    pub const OGG_AUDIO: &str = "audio/ogg";
    pub const MP4: &str = "video/mp4";
    pub const WEBM: &str = "video/webm";

    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";
    pub const OTF: &str = "font/otf";
    pub const EOT: &str = "application/vnd.ms-fontobject";

    pub const PDF: &str = "application/pdf";
    pub const WASM: &str = "application/wasm";
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Content-Type for an extension with leading dot (e.g. `".tsx"`).
///
/// Unknown extensions return `application/octet-stream`.
pub fn from_ext(ext: &str) -> &'static str {
    match ext {
        ".html" | ".htm" => types::HTML,
        ".css" => types::CSS,
        ".js" | ".mjs" | ".cjs" | ".ts" | ".mts" | ".jsx" | ".tsx" => types::JAVASCRIPT,
        ".json" => types::JSON,
        ".map" => types::JSON,
        ".xml" => types::XML,
        ".txt" => types::PLAIN,
        ".csv" => types::CSV,

        ".svg" => types::SVG,
        ".png" => types::PNG,
        ".jpg" | ".jpeg" => types::JPEG,
        ".gif" => types::GIF,
        ".webp" => types::WEBP,
        ".avif" => types::AVIF,
        ".ico" => types::ICO,

        ".mp3" => types::MP3,
        ".wav" => types::WAV,
        ".ogg" | ".oga" => types::OGG_AUDIO,
        ".mp4" | ".m4v" => types::MP4,
        ".webm" => types::WEBM,

        ".woff" => types::WOFF,
        ".woff2" => types::WOFF2,
        ".ttf" => types::TTF,
        ".otf" => types::OTF,
        ".eot" => types::EOT,

        ".pdf" => types::PDF,
        ".wasm" => types::WASM,

        _ => types::OCTET_STREAM,
    }
}

/// Content-Type for a URL path (extension taken from the last segment).
pub fn from_path(path: &str) -> &'static str {
    crate::utils::path::ext_with_dot(path)
        .map(from_ext)
        .unwrap_or(types::OCTET_STREAM)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_family_unified() {
        for ext in [".js", ".mjs", ".cjs", ".ts", ".mts", ".jsx", ".tsx"] {
            assert_eq!(from_ext(ext), types::JAVASCRIPT);
        }
    }

    #[test]
    fn test_common_types() {
        assert_eq!(from_ext(".html"), types::HTML);
        assert_eq!(from_ext(".css"), types::CSS);
        assert_eq!(from_ext(".svg"), types::SVG);
        assert_eq!(from_ext(".woff2"), types::WOFF2);
        assert_eq!(from_ext(".wasm"), types::WASM);
        assert_eq!(from_ext(".map"), types::JSON);
    }

    #[test]
    fn test_unknown_falls_back() {
        assert_eq!(from_ext(".xyz"), types::OCTET_STREAM);
        assert_eq!(from_path("/no/extension"), types::OCTET_STREAM);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(from_path("/apps/header/main.tsx"), types::JAVASCRIPT);
        assert_eq!(from_path("/index.html"), types::HTML);
    }
}
