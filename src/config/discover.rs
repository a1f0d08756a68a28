//! Project auto-discovery for configless startup.
//!
//! A direct subdirectory is an app iff it carries a Vite or Astro config
//! file. Framework comes from a dependency-substring match in the app's
//! package.json; the original dev-server port from a string scan of the
//! config file (no regex), falling back to sequential assignment from 5001.

use std::path::Path;

use crate::debug;

use super::{AppConfig, ProjectConfig};

const APP_CONFIG_FILES: [&str; 5] = [
    "vite.config.js",
    "vite.config.ts",
    "vite.config.mjs",
    "astro.config.mjs",
    "astro.config.ts",
];

/// Dependency substring → framework tag. Longer, more specific markers
/// first: `preact` would otherwise be swallowed by the `react` substring.
const FRAMEWORK_MARKERS: [(&str, &str); 8] = [
    ("@angular/core", "angular"),
    ("solid-js", "solid"),
    ("preact", "preact"),
    ("svelte", "svelte"),
    ("astro", "astro"),
    ("react", "react"),
    ("vue", "vue"),
    ("lit", "lit"),
];

/// Fallback port sequence starts here.
const FIRST_PORT: u16 = 5001;

/// Scan `root`'s immediate subdirectories and synthesize a config.
pub fn discover_apps(root: &Path) -> ProjectConfig {
    let mut apps = Vec::new();
    let mut next_port = FIRST_PORT;

    let Ok(entries) = std::fs::read_dir(root) else {
        return ProjectConfig::default();
    };

    let mut dirs: Vec<_> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .map(|e| e.path())
        .collect();
    dirs.sort();

    for dir in dirs {
        let Some(config_file) = APP_CONFIG_FILES
            .iter()
            .map(|f| dir.join(f))
            .find(|p| p.is_file())
        else {
            continue;
        };

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name == "shell" {
            continue;
        }

        let framework = infer_framework(&dir);
        let port = scan_port(&config_file).unwrap_or_else(|| {
            let p = next_port;
            next_port += 1;
            p
        });

        debug!("config"; "discovered {name} ({framework}) on port {port}");
        apps.push(AppConfig {
            name: name.clone(),
            dir: name,
            framework: framework.to_string(),
            port,
        });
    }

    ProjectConfig {
        name: root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "wu-project".to_string()),
        apps,
        ..ProjectConfig::default()
    }
}

/// Substring-match the dependency block of the app's package.json.
fn infer_framework(dir: &Path) -> &'static str {
    let Ok(manifest) = std::fs::read_to_string(dir.join("package.json")) else {
        return "vanilla";
    };
    for (marker, tag) in FRAMEWORK_MARKERS {
        if manifest.contains(marker) {
            return tag;
        }
    }
    "vanilla"
}

/// Regex-free scan for `port: NNNN` in a Vite/Astro config.
fn scan_port(config_file: &Path) -> Option<u16> {
    let text = std::fs::read_to_string(config_file).ok()?;
    let bytes = text.as_bytes();
    let mut search = 0;

    while let Some(found) = text[search..].find("port") {
        let mut i = search + found + 4;
        search = i;

        while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
            i += 1;
        }
        if bytes.get(i) != Some(&b':') {
            continue;
        }
        i += 1;
        while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
            i += 1;
        }

        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i > start
            && let Ok(port) = text[start..i].parse()
        {
            return Some(port);
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
