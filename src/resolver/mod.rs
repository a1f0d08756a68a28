//! npm-style module resolution from first principles.
//!
//! Resolves bare specifiers against on-disk package trees: `node_modules`
//! lookup with a workspace fallback, `exports` condition maps, `module` /
//! `main` / `index.js` entry points, subpath extension probing, and
//! Node-style `#imports`. Every call re-verifies existence on disk, so a
//! package installed mid-session is picked up on the next request.

mod package_json;

pub use package_json::{Value, extract};

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Export-condition priority. `types` keys are not listed and therefore
/// never selected; `.d.ts` values are skipped explicitly as well.
const CONDITIONS: [&str; 5] = ["import", "module", "browser", "default", "require"];

/// Extensions probed for subpaths without an exports map.
const SUBPATH_EXTS: [&str; 5] = [".js", ".mjs", ".ts", ".tsx", ".jsx"];

/// Index files probed for directory subpaths.
const INDEX_FILES: [&str; 4] = ["index.js", "index.mjs", "index.ts", "index.tsx"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("package not found: {0}")]
    PackageNotFound(String),
    #[error("no entry point found for {0}")]
    EntryPointNotFound(String),
}

/// A successfully resolved module file.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModule {
    pub file_path: String,
    pub package_dir: String,
    pub is_esm: bool,
}

/// Resolve a bare specifier against the search directories in order.
pub fn resolve(specifier: &str, search_dirs: &[PathBuf]) -> Result<ResolvedModule, ResolveError> {
    let (pkg, subpath) = split_package(specifier);

    let package_dir = find_package_dir(pkg, search_dirs)
        .ok_or_else(|| ResolveError::PackageNotFound(specifier.to_string()))?;

    let manifest = std::fs::read_to_string(package_dir.join("package.json"))
        .map_err(|_| ResolveError::PackageNotFound(specifier.to_string()))?;

    let pkg_type_module = extract(&manifest, "type")
        .and_then(|v| v.as_str().map(|s| s == "module"))
        .unwrap_or(false);

    let found = match subpath {
        Some(sub) => resolve_subpath(&package_dir, &manifest, sub),
        None => resolve_root(&package_dir, &manifest),
    };

    match found {
        Some((file, esm_condition)) => {
            let is_esm = esm_condition || file.ends_with(".mjs") || pkg_type_module;
            Ok(ResolvedModule {
                file_path: file,
                package_dir: package_dir.to_string_lossy().into_owned(),
                is_esm,
            })
        }
        None => Err(ResolveError::EntryPointNotFound(specifier.to_string())),
    }
}

/// Resolve a `#imports` specifier against the owning package. Returns the
/// package-relative path of the target file.
pub fn resolve_hash_import(specifier: &str, package_dir: &Path) -> Option<String> {
    let manifest = std::fs::read_to_string(package_dir.join("package.json")).ok()?;
    let imports = extract(&manifest, "imports")?;
    let region = imports.as_object()?;
    let value = extract(region, specifier)?;
    let (target, _) = resolve_conditions(value)?;
    let rel = target.trim_start_matches("./").to_string();
    package_dir.join(&rel).is_file().then_some(rel)
}

// =============================================================================
// Specifier splitting and package lookup
// =============================================================================

/// Split a specifier into package name and optional subpath. Scoped
/// packages keep their first two segments.
pub fn split_package(specifier: &str) -> (&str, Option<&str>) {
    let cut = if specifier.starts_with('@') {
        specifier
            .find('/')
            .and_then(|first| specifier[first + 1..].find('/').map(|s| first + 1 + s))
    } else {
        specifier.find('/')
    };
    match cut {
        Some(i) => (&specifier[..i], Some(&specifier[i + 1..])),
        None => (specifier, None),
    }
}

/// `<dir>/node_modules/<pkg>` for each search dir, then `<dir>/<pkg>` as a
/// workspace fallback.
fn find_package_dir(pkg: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
    for dir in search_dirs {
        let candidate = dir.join("node_modules").join(pkg);
        if candidate.join("package.json").is_file() {
            return Some(candidate);
        }
    }
    for dir in search_dirs {
        let candidate = dir.join(pkg);
        if candidate.join("package.json").is_file() {
            return Some(candidate);
        }
    }
    None
}

// =============================================================================
// Entry-point resolution
// =============================================================================

/// Root entry: exports map, then `module`, then `main`, then `index.js`.
/// The first candidate that exists on disk wins.
fn resolve_root(package_dir: &Path, manifest: &str) -> Option<(String, bool)> {
    if let Some(exports) = extract(manifest, "exports") {
        // The map may carry a "." entry or be a bare condition object /
        // string
        let root_value = match exports {
            Value::Object(region) => Some(extract(region, ".").unwrap_or(Value::Object(region))),
            Value::Str(s) => Some(Value::Str(s)),
            _ => None,
        };
        if let Some(value) = root_value
            && let Some((target, esm)) = resolve_conditions(value)
            && let Some(file) = existing(package_dir, &target)
        {
            return Some((file, esm));
        }
    }

    for (field, esm) in [("module", true), ("main", false)] {
        if let Some(Value::Str(target)) = extract(manifest, field)
            && let Some(file) = existing(package_dir, target)
        {
            return Some((file, esm));
        }
    }

    existing(package_dir, "index.js").map(|f| (f, false))
}

/// Subpath entry: `./subpath` in the exports map when one exists, falling
/// back to direct file probing under the package directory.
fn resolve_subpath(package_dir: &Path, manifest: &str, sub: &str) -> Option<(String, bool)> {
    if let Some(Value::Object(region)) = extract(manifest, "exports")
        && let Some(value) = extract(region, &format!("./{sub}"))
        && let Some((target, esm)) = resolve_conditions(value)
        && let Some(file) = existing(package_dir, &target)
    {
        return Some((file, esm));
    }

    // Extension probing
    for ext in SUBPATH_EXTS {
        if let Some(file) = existing(package_dir, &format!("{sub}{ext}")) {
            return Some((file, false));
        }
    }
    // Directory index
    for index in INDEX_FILES {
        if let Some(file) = existing(package_dir, &format!("{sub}/{index}")) {
            return Some((file, false));
        }
    }
    // Verbatim
    existing(package_dir, sub).map(|f| (f, false))
}

/// Resolve an exports value: a string, or a nested condition object walked
/// in priority order. Returns the target and whether an ESM condition
/// (`import`/`module`) selected it. Declaration files are skipped so a
/// `types` string never wins.
fn resolve_conditions(value: Value<'_>) -> Option<(String, bool)> {
    match value {
        Value::Str(s) => {
            if s.ends_with(".d.ts") || s.ends_with(".d.mts") {
                return None;
            }
            Some((s.to_string(), false))
        }
        Value::Object(region) => {
            for cond in CONDITIONS {
                if let Some(inner) = extract(region, cond)
                    && let Some((target, esm)) = resolve_conditions(inner)
                {
                    let via_esm = esm || cond == "import" || cond == "module";
                    return Some((target, via_esm));
                }
            }
            None
        }
        _ => None,
    }
}

/// Join a manifest-relative target and return it only if the file exists.
fn existing(package_dir: &Path, target: &str) -> Option<String> {
    let path = package_dir.join(target.trim_start_matches("./"));
    path.is_file().then(|| path.to_string_lossy().into_owned())
}

// =============================================================================
// Tests
// =============================================================================
