//! Two-level compile cache.
//!
//! Level 1 is a bounded in-memory ring of 256 entries behind one mutex.
//! Level 2 persists bodies under `.wu-cache/<hex64>.dat`, first line the
//! mtime as a signed decimal, remainder the body — which is what makes
//! compile results survive a server restart. Entries are keyed by
//! `(path, mtime)` with mtime carried at full precision (signed 128-bit
//! nanoseconds), so any touch of the source file invalidates its entry on
//! the next read.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use parking_lot::Mutex;

use crate::debug;
use crate::utils::hash::{hash_str, hex64};

/// Level-1 capacity.
const RING_SIZE: usize = 256;

/// Cache directory name (under the project root).
pub const CACHE_DIR: &str = ".wu-cache";

struct Slot {
    path_hash: u64,
    mtime: i128,
    body: Vec<u8>,
}

struct Ring {
    slots: Vec<Option<Slot>>,
    next: usize,
}

/// The shared compile cache.
pub struct CompileCache {
    ring: Mutex<Ring>,
    /// `None` when the cache directory could not be created; Level 2 is
    /// then silently disabled.
    disk_dir: Option<PathBuf>,
}

impl CompileCache {
    /// Create a cache rooted at `root` (Level 2 in `<root>/.wu-cache/`).
    pub fn new(root: &Path) -> Self {
        let dir = root.join(CACHE_DIR);
        let disk_dir = match std::fs::create_dir_all(&dir) {
            Ok(()) => Some(dir),
            Err(e) => {
                debug!("cache"; "disk cache disabled: {e}");
                None
            }
        };
        Self {
            ring: Mutex::new(Ring {
                slots: (0..RING_SIZE).map(|_| None).collect(),
                next: 0,
            }),
            disk_dir,
        }
    }

    /// Look up `(path, mtime)`. A hit returns a freshly-duplicated body.
    /// Stale entries (same path, different mtime) are dropped on sight; a
    /// disk hit is promoted into the ring.
    pub fn get(&self, path: &str, mtime: i128) -> Option<Vec<u8>> {
        let hash = hash_str(path);

        {
            let mut ring = self.ring.lock();
            if let Some(idx) = ring.find(hash) {
                let slot = ring.slots[idx].as_ref().unwrap();
                if slot.mtime == mtime {
                    return Some(slot.body.clone());
                }
                ring.slots[idx] = None;
            }
        }

        let body = self.disk_get(hash, mtime)?;
        self.ring.lock().insert(hash, mtime, body.clone());
        Some(body)
    }

    /// Insert into both levels. Level-2 errors are swallowed: a body that
    /// cannot be persisted just means a recompile after the next restart.
    pub fn put(&self, path: &str, mtime: i128, body: &[u8]) {
        let hash = hash_str(path);
        self.ring.lock().insert(hash, mtime, body.to_vec());

        if let Some(dir) = &self.disk_dir {
            let mut data = Vec::with_capacity(body.len() + 48);
            data.extend_from_slice(mtime.to_string().as_bytes());
            data.push(b'\n');
            data.extend_from_slice(body);
            if let Err(e) = std::fs::write(dir.join(format!("{}.dat", hex64(hash))), data) {
                debug!("cache"; "persist failed for {path}: {e}");
            }
        }
    }

    /// Free all in-memory bodies (shutdown).
    pub fn teardown(&self) {
        let mut ring = self.ring.lock();
        for slot in ring.slots.iter_mut() {
            *slot = None;
        }
    }

    fn disk_get(&self, hash: u64, mtime: i128) -> Option<Vec<u8>> {
        let dir = self.disk_dir.as_ref()?;
        let path = dir.join(format!("{}.dat", hex64(hash)));
        let data = std::fs::read(&path).ok()?;

        let nl = data.iter().position(|&b| b == b'\n')?;
        let stored: i128 = std::str::from_utf8(&data[..nl]).ok()?.parse().ok()?;
        if stored != mtime {
            // Stale on-disk entry; drop it so it cannot match again
            let _ = std::fs::remove_file(&path);
            return None;
        }
        Some(data[nl + 1..].to_vec())
    }
}

impl Ring {
    fn find(&self, hash: u64) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.path_hash == hash))
    }

    /// Replace the existing slot for this hash, or overwrite the next
    /// round-robin slot.
    fn insert(&mut self, hash: u64, mtime: i128, body: Vec<u8>) {
        let idx = match self.find(hash) {
            Some(idx) => idx,
            None => {
                let idx = self.next;
                self.next = (self.next + 1) % RING_SIZE;
                idx
            }
        };
        self.slots[idx] = Some(Slot {
            path_hash: hash,
            mtime,
            body,
        });
    }
}

/// Read a file's mtime as signed nanoseconds since the epoch (negative for
/// pre-epoch timestamps).
pub fn mtime_of(path: &Path) -> Option<i128> {
    let modified = path.metadata().and_then(|m| m.modified()).ok()?;
    Some(match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_nanos() as i128,
        Err(e) => -(e.duration().as_nanos() as i128),
    })
}

/// Remove the on-disk cache directory (`--clean`).
pub fn clear_cache_dir(root: &Path) -> std::io::Result<()> {
    let dir = root.join(CACHE_DIR);
    if dir.exists() {
        std::fs::remove_dir_all(&dir)?;
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
