//! Hot-reload event protocol.
//!
//! Events are serialized as JSON objects and delivered verbatim over both
//! transports (WebSocket text frames and SSE `data:` lines).

use serde::{Deserialize, Serialize};

/// A change event produced by the watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HmrEvent {
    /// Sent once on WebSocket connect.
    Connected,

    /// A single app changed and only its stylesheets did.
    CssUpdate { app: String },

    /// A single app changed; the client re-imports and re-mounts it.
    AppUpdate {
        app: String,
        dir: String,
        framework: String,
    },

    /// Anything broader: config change, multiple apps, shell, deletions.
    FullReload,
}

impl HmrEvent {
    /// Serialize to JSON. Falls back to a full reload on the (unreachable)
    /// serialization failure so clients never miss a change.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"full-reload"}"#.to_string())
    }

    pub fn from_json(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(HmrEvent::Connected.to_json(), r#"{"type":"connected"}"#);
        assert_eq!(HmrEvent::FullReload.to_json(), r#"{"type":"full-reload"}"#);
        assert_eq!(
            HmrEvent::CssUpdate {
                app: "header".into()
            }
            .to_json(),
            r#"{"type":"css-update","app":"header"}"#
        );
    }

    #[test]
    fn test_app_update_fields() {
        let json = HmrEvent::AppUpdate {
            app: "cart".into(),
            dir: "mf-cart".into(),
            framework: "vue".into(),
        }
        .to_json();
        assert!(json.contains(r#""type":"app-update""#));
        assert!(json.contains(r#""dir":"mf-cart""#));
        assert!(json.contains(r#""framework":"vue""#));
    }

    #[test]
    fn test_roundtrip() {
        let ev = HmrEvent::AppUpdate {
            app: "a".into(),
            dir: "d".into(),
            framework: "react".into(),
        };
        assert_eq!(HmrEvent::from_json(&ev.to_json()), Some(ev));
    }
}
