//! Polling file watcher.
//!
//! Every 100 ms the watcher walks the shell and app directories, compares
//! file mtimes against its table, prunes records whose files vanished, and
//! publishes one classified event per round that saw changes. The config
//! file gets its own debounce window so an editor's write bursts collapse
//! into a single reload.

mod classify;

pub use classify::{RoundChanges, classify};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::cache::mtime_of;
use crate::config::{AppEntry, CONFIG_FILE, ProjectConfig};
use crate::hmr::HmrEvent;
use crate::server::ServerContext;
use crate::{debug, log};

/// Scan cadence.
pub const SCAN_INTERVAL: Duration = Duration::from_millis(100);

/// Watched-file table capacity; overflow is silently dropped.
const MAX_ENTRIES: usize = 4096;

/// Recursion bound for the directory walk.
const MAX_DEPTH: usize = 32;

/// Successive stable scans required after a config mtime change.
const CONFIG_DEBOUNCE_ROUNDS: u8 = 5;

/// Directories never descended into (plus anything dot-prefixed).
const SKIP_DIRS: [&str; 9] = [
    "node_modules",
    "dist",
    "build",
    ".git",
    ".svelte-kit",
    ".next",
    ".nuxt",
    "coverage",
    ".claude",
];

/// Extensions that participate in change detection.
const WATCHED_EXTS: [&str; 11] = [
    ".js", ".mjs", ".ts", ".tsx", ".jsx", ".html", ".css", ".json", ".svelte", ".vue", ".astro",
];

struct WatchEntry {
    mtime: i128,
    generation: u32,
}

/// Result of one scan round.
pub struct RoundResult {
    pub event: Option<HmrEvent>,
    /// The config file's mtime stabilized after a change; the caller
    /// should reload and swap the app list.
    pub reload_config: bool,
}

pub struct Watcher {
    root: PathBuf,
    entries: FxHashMap<u64, WatchEntry>,
    generation: u32,
    config_mtime: Option<i128>,
    /// `Some((mtime, stable_rounds))` while debouncing a config change.
    config_debounce: Option<(Option<i128>, u8)>,
}

impl Watcher {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            entries: FxHashMap::default(),
            generation: 0,
            config_mtime: mtime_of(&root.join(CONFIG_FILE)),
            config_debounce: None,
        }
    }

    /// One scan round over the shell directory and every live app
    /// directory.
    pub fn poll(&mut self, shell_dir: &str, apps: &[AppEntry]) -> RoundResult {
        self.generation += 1;
        let first_round = self.generation == 1;
        let mut changes = RoundChanges::default();

        let shell_root = self.root.join(shell_dir);
        self.walk(&shell_root, 0, None, first_round, &mut changes);

        for (idx, app) in apps.iter().enumerate() {
            let app_root = self.root.join(&app.dir);
            self.walk(&app_root, 0, Some(idx), first_round, &mut changes);
        }

        // Entries not seen this round are deletions; prune them in one pass
        let generation = self.generation;
        let before = self.entries.len();
        self.entries.retain(|_, e| e.generation == generation);
        if self.entries.len() != before && !first_round {
            changes.deletions = true;
        }

        let reload_config = self.poll_config(&mut changes);

        RoundResult {
            event: classify(&changes, apps),
            reload_config,
        }
    }

    fn walk(
        &mut self,
        dir: &Path,
        depth: usize,
        app_idx: Option<usize>,
        first_round: bool,
        changes: &mut RoundChanges,
    ) {
        if depth > MAX_DEPTH {
            return;
        }
        // A failed read_dir skips this subtree for the round; the next
        // round retries
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if path.is_dir() {
                if name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref()) {
                    continue;
                }
                self.walk(&path, depth + 1, app_idx, first_round, changes);
                continue;
            }

            if is_temp_file(&name) {
                continue;
            }
            let Some(ext) = watched_ext(&name) else {
                continue;
            };
            self.observe_file(&path, ext, app_idx, first_round, changes);
        }
    }

    fn observe_file(
        &mut self,
        path: &Path,
        ext: &'static str,
        app_idx: Option<usize>,
        first_round: bool,
        changes: &mut RoundChanges,
    ) {
        let Some(mtime) = mtime_of(path) else {
            return;
        };
        let key = crate::utils::hash::hash_str(&path.to_string_lossy());
        let generation = self.generation;

        match self.entries.get_mut(&key) {
            Some(entry) => {
                if entry.mtime != mtime {
                    entry.mtime = mtime;
                    record_change(changes, ext, app_idx);
                    debug!("watch"; "changed: {}", path.display());
                }
                entry.generation = generation;
            }
            None => {
                if self.entries.len() >= MAX_ENTRIES {
                    return;
                }
                self.entries.insert(key, WatchEntry { mtime, generation });
                if !first_round {
                    record_change(changes, ext, app_idx);
                    debug!("watch"; "created: {}", path.display());
                }
            }
        }
    }

    /// Debounced config-file polling. Returns true when a changed config
    /// has been stable for [`CONFIG_DEBOUNCE_ROUNDS`] scans.
    fn poll_config(&mut self, changes: &mut RoundChanges) -> bool {
        let current = mtime_of(&self.root.join(CONFIG_FILE));

        if let Some((pending, stable)) = self.config_debounce {
            if current == pending {
                let stable = stable + 1;
                if stable >= CONFIG_DEBOUNCE_ROUNDS {
                    self.config_debounce = None;
                    self.config_mtime = current;
                    changes.config_changed = true;
                    return true;
                }
                self.config_debounce = Some((pending, stable));
            } else {
                // Still being written; restart the window
                self.config_debounce = Some((current, 0));
            }
            return false;
        }

        if current != self.config_mtime {
            self.config_debounce = Some((current, 0));
        }
        false
    }
}

fn record_change(changes: &mut RoundChanges, ext: &str, app_idx: Option<usize>) {
    changes.changed_exts.insert(ext.to_string());
    match app_idx {
        Some(idx) => {
            changes.changed_apps.insert(idx);
        }
        None => changes.shell_changed = true,
    }
}

fn watched_ext(name: &str) -> Option<&'static str> {
    let dot = name.rfind('.')?;
    WATCHED_EXTS.iter().find(|&&e| e == &name[dot..]).copied()
}

/// Editor droppings that would otherwise thrash the event stream.
fn is_temp_file(name: &str) -> bool {
    name.ends_with('~')
        || name.starts_with('.')
        || name.ends_with(".swp")
        || name.ends_with(".tmp")
        || name.ends_with(".bak")
}

// =============================================================================
// Background task
// =============================================================================

/// Run the watcher on its own thread until shutdown. Publishes classified
/// events into the context's HMR channel and swaps the app list on config
/// reloads.
pub fn spawn(ctx: Arc<ServerContext>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("wu-watcher".into())
        .spawn(move || {
            let mut watcher = Watcher::new(&ctx.root);

            while !ctx.is_shutdown() {
                std::thread::sleep(SCAN_INTERVAL);

                let config = ctx.config();
                let apps = ctx.apps();
                let result = watcher.poll(&config.shell.dir, &apps);

                if result.reload_config {
                    match ProjectConfig::load(&ctx.root) {
                        Ok(fresh) => {
                            log!("watch"; "config reloaded ({} apps)", fresh.apps.len());
                            ctx.swap_config(fresh);
                        }
                        Err(e) => log!("watch"; "config reload failed: {e}"),
                    }
                }

                if let Some(event) = result.event {
                    debug!("watch"; "publishing {}", event.to_json());
                    ctx.channel.publish(&event);
                }
            }
        })
        .expect("failed to spawn watcher thread")
}

// =============================================================================
// Tests
// =============================================================================
