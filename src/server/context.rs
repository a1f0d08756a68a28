//! Server-owned shared state.
//!
//! One context owns everything the request tasks, the watcher, and the
//! signal handler share: config snapshots, the live app list, the HMR
//! channel, the compile cache, and the broker. The signal handler captures
//! an `Arc` of this context in its closure; there are no module-level
//! mutable globals.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::broker::Broker;
use crate::cache::CompileCache;
use crate::config::{AppEntry, ProjectConfig};
use crate::hmr::HmrChannel;

pub struct ServerContext {
    pub root: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub channel: HmrChannel,
    pub cache: CompileCache,
    pub broker: Broker,

    shutdown: AtomicBool,
    /// Current config snapshot.
    current: Mutex<Arc<ProjectConfig>>,
    /// Every snapshot ever loaded. Request tasks may hold strings owned by
    /// an old snapshot, so none is dropped before shutdown; the cost is
    /// tens of kilobytes per reload.
    snapshots: Mutex<Vec<Arc<ProjectConfig>>>,
    /// Live app list pointer, swapped atomically by the watcher.
    apps: Mutex<Arc<Vec<AppEntry>>>,
}

impl ServerContext {
    pub fn new(root: PathBuf, host: IpAddr, port: u16, config: ProjectConfig) -> Self {
        let snapshot = Arc::new(config);
        let apps = Arc::new(snapshot.app_entries());
        Self {
            cache: CompileCache::new(&root),
            broker: Broker::new(&root),
            channel: HmrChannel::new(),
            host,
            port,
            root,
            shutdown: AtomicBool::new(false),
            current: Mutex::new(Arc::clone(&snapshot)),
            snapshots: Mutex::new(vec![snapshot]),
            apps: Mutex::new(apps),
        }
    }

    /// Current config snapshot.
    pub fn config(&self) -> Arc<ProjectConfig> {
        Arc::clone(&self.current.lock())
    }

    /// Live app list.
    pub fn apps(&self) -> Arc<Vec<AppEntry>> {
        Arc::clone(&self.apps.lock())
    }

    pub fn shell_dir(&self) -> String {
        self.config().shell.dir.clone()
    }

    /// Install a freshly-loaded config: retain the snapshot and swap the
    /// live app list.
    pub fn swap_config(&self, config: ProjectConfig) {
        let snapshot = Arc::new(config);
        let apps = Arc::new(snapshot.app_entries());
        self.snapshots.lock().push(Arc::clone(&snapshot));
        *self.current.lock() = snapshot;
        *self.apps.lock() = apps;
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Mark the server as stopping and release held resources. Called from
    /// the signal handler.
    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.cache.teardown();
        self.broker.terminate();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn context() -> ServerContext {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = ProjectConfig::parse(
            r#"{ "apps": [ { "name": "a", "dir": "da", "framework": "react" } ] }"#,
        )
        .unwrap();
        ServerContext::new(
            tmp.path().to_path_buf(),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            3000,
            config,
        )
    }

    #[test]
    fn test_swap_retains_old_snapshot() {
        let ctx = context();
        let old_apps = ctx.apps();
        assert_eq!(old_apps.len(), 1);

        let newer = ProjectConfig::parse(
            r#"{ "apps": [
                { "name": "a", "dir": "da", "framework": "react" },
                { "name": "b", "dir": "db", "framework": "vue" }
            ] }"#,
        )
        .unwrap();
        ctx.swap_config(newer);

        // New readers see the new list; the captured old list stays valid
        assert_eq!(ctx.apps().len(), 2);
        assert_eq!(old_apps.len(), 1);
        assert_eq!(ctx.snapshots.lock().len(), 2);
    }

    #[test]
    fn test_shutdown_flag() {
        let ctx = context();
        assert!(!ctx.is_shutdown());
        ctx.begin_shutdown();
        assert!(ctx.is_shutdown());
    }
}
