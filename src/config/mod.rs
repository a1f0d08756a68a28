//! Project configuration (`wu.config.json`).
//!
//! Loaded once at startup and reloaded by the watcher when the file
//! changes. Unknown keys are ignored; every field has a default so a
//! partial config (or none at all — see [`discover`]) still produces a
//! usable project.

mod discover;

pub use discover::discover_apps;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::log;

/// Configuration file name at the project root.
pub const CONFIG_FILE: &str = "wu.config.json";

// ============================================================================
// Typed config record
// ============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub apps: Vec<AppConfig>,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_shell_dir")]
    pub dir: String,
    #[serde(default = "default_shell_port")]
    pub port: u16,
    #[serde(default = "default_framework")]
    pub framework: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub dir: String,
    #[serde(default = "default_framework")]
    pub framework: String,
    /// Original standalone dev-server port; retained for display only.
    #[serde(default)]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_port")]
    pub port: u16,
    #[serde(default)]
    pub open_browser: bool,
}

fn default_shell_dir() -> String {
    "shell".to_string()
}
fn default_shell_port() -> u16 {
    4321
}
fn default_framework() -> String {
    "vanilla".to_string()
}
fn default_proxy_port() -> u16 {
    3000
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            dir: default_shell_dir(),
            port: default_shell_port(),
            framework: default_framework(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_proxy_port(),
            open_browser: false,
        }
    }
}

impl ProjectConfig {
    /// Load from `<root>/wu.config.json`; an absent file triggers
    /// directory auto-discovery.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if path.is_file() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Self::parse(&text)
        } else {
            log!("config"; "no {CONFIG_FILE}, scanning project directories");
            Ok(discover_apps(root))
        }
    }

    /// Parse the JSON text; unknown keys are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid wu.config.json")
    }

    /// Directories the module resolver probes, in priority order: project
    /// root first, then each app, then the shell.
    pub fn resolve_dirs(&self, root: &Path) -> Vec<PathBuf> {
        let mut dirs = vec![root.to_path_buf()];
        for app in &self.apps {
            dirs.push(root.join(&app.dir));
        }
        dirs.push(root.join(&self.shell.dir));
        dirs
    }

    /// Runtime app entries derived from this snapshot.
    pub fn app_entries(&self) -> Vec<AppEntry> {
        self.apps
            .iter()
            .map(|a| AppEntry {
                name: a.name.clone(),
                dir: a.dir.clone(),
                framework: a.framework.clone(),
            })
            .collect()
    }
}

/// A live app record. Strings are owned by the config snapshot that
/// produced them; snapshots are retained until shutdown so slices held by
/// in-flight requests stay valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEntry {
    pub name: String,
    pub dir: String,
    pub framework: String,
}

// ============================================================================
// Framework table
// ============================================================================

/// Badge color for a framework tag (used by `/@wu/apps.json` and the shell
/// overlay).
pub fn framework_color(tag: &str) -> &'static str {
    match tag {
        "react" => "#61dafb",
        "vue" => "#42b883",
        "angular" => "#dd0031",
        "svelte" => "#ff3e00",
        "solid" => "#2c4f7c",
        "preact" => "#673ab8",
        "lit" => "#324fff",
        "astro" => "#ff5d01",
        "alpine" => "#8bc0d0",
        "qwik" => "#ac7ef4",
        "stencil" => "#4c48ff",
        "htmx" => "#3366cc",
        "stimulus" => "#77e8b9",
        _ => "#f7df1e",
    }
}

/// Entry-file extension for a framework tag.
pub fn entry_ext(tag: &str) -> &'static str {
    match tag {
        "react" | "preact" | "solid" | "qwik" => "jsx",
        "angular" => "ts",
        _ => "js",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parse() {
        let text = r#"{
            "name": "demo",
            "version": "0.1.0",
            "shell": { "dir": "shell", "port": 4321, "framework": "lit" },
            "apps": [
                { "name": "header", "dir": "mf-header", "framework": "react", "port": 5001 }
            ],
            "proxy": { "port": 3000, "open_browser": false }
        }"#;
        let config = ProjectConfig::parse(text).unwrap();
        assert_eq!(config.apps.len(), 1);
        assert_eq!(config.shell.port, 4321);
        assert_eq!(config.proxy.port, 3000);
        assert_eq!(config.apps[0].name, "header");
        assert_eq!(config.apps[0].framework, "react");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let text = r#"{ "name": "x", "future_field": { "a": 1 }, "apps": [] }"#;
        let config = ProjectConfig::parse(text).unwrap();
        assert_eq!(config.name, "x");
        assert!(config.apps.is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = ProjectConfig::parse("{}").unwrap();
        assert_eq!(config.shell.dir, "shell");
        assert_eq!(config.shell.port, 4321);
        assert_eq!(config.proxy.port, 3000);
        assert!(!config.proxy.open_browser);
    }

    #[test]
    fn test_entry_ext_table() {
        assert_eq!(entry_ext("react"), "jsx");
        assert_eq!(entry_ext("preact"), "jsx");
        assert_eq!(entry_ext("solid"), "jsx");
        assert_eq!(entry_ext("qwik"), "jsx");
        assert_eq!(entry_ext("angular"), "ts");
        assert_eq!(entry_ext("vue"), "js");
        assert_eq!(entry_ext("vanilla"), "js");
    }

    #[test]
    fn test_app_entries_owned() {
        let text = r#"{ "apps": [ { "name": "a", "dir": "d", "framework": "vue" } ] }"#;
        let config = ProjectConfig::parse(text).unwrap();
        let entries = config.app_entries();
        assert_eq!(
            entries[0],
            AppEntry {
                name: "a".into(),
                dir: "d".into(),
                framework: "vue".into()
            }
        );
    }
}
