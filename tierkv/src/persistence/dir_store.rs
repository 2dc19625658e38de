use super::types::{DirStoreConfig, FsyncMode};
use crate::core::error::{KvError, Result};
use crate::core::item::{Item, transfer};
use crate::core::key;
use crate::core::store::{Completion, SharedItem, Store};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, DirBuilder, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::Handle;
use tokio::sync::{Notify, oneshot};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Prefix of in-progress write files. Escaped key segments always follow `%`
/// with two hex digits, so no key can map to a name starting with this.
const TEMP_PREFIX: &str = "%tmp-";

/// Store that keeps each item in its own file below a root directory
///
/// Reads are synchronous. Writes run on the runtime's blocking pool and land
/// atomically: the value goes to a temporary file that is then renamed over
/// the key's path. Each path only ever moves forward to its newest `set`: a
/// write that finishes after a later one for the same key is discarded, and
/// reads see the newest dispatched value while it is still being written.
#[derive(Clone)]
pub struct DirStore {
    inner: Arc<Inner>,
    handle: Handle,
}

struct Inner {
    config: DirStoreConfig,
    /// Guards the directory structure against concurrent commits
    layout: RwLock<()>,
    in_flight: AtomicUsize,
    idle: Notify,
    /// Paths written or removed since the last flush
    dirty: Mutex<HashSet<PathBuf>>,
    /// Newest dispatched write per path, kept while any write to it runs
    pending: Mutex<HashMap<PathBuf, Pending>>,
}

struct Pending {
    generation: u64,
    writers: usize,
    /// `None` for a delete
    latest: Option<SharedItem>,
}

impl DirStore {
    /// Open a store rooted at `root` with default settings
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open(DirStoreConfig::new(root))
    }

    /// Open a store that dispatches writes on the current tokio runtime
    pub fn open(config: DirStoreConfig) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| KvError::NoRuntime(e.to_string()))?;
        Ok(Self::with_handle(config, handle))
    }

    /// Open a store that dispatches writes on the given runtime
    pub fn with_handle(config: DirStoreConfig, handle: Handle) -> Self {
        info!(
            "Directory store opened at {:?}, fsync={:?}",
            config.root, config.fsync_mode
        );

        Self {
            inner: Arc::new(Inner {
                config,
                layout: RwLock::new(()),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                dirty: Mutex::new(HashSet::new()),
                pending: Mutex::new(HashMap::new()),
            }),
            handle,
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.config.root
    }

    /// Number of writes dispatched but not yet finished
    pub fn pending_writes(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }
}

impl Store for DirStore {
    fn get_into(&self, key: &str, item: &mut dyn Item) -> bool {
        let path = match key::to_path(self.root(), key) {
            Ok(path) => path,
            Err(e) => {
                debug!("GET rejected: {}", e);
                return false;
            }
        };

        if let Some(latest) = self.inner.pending_value(&path) {
            let Some(pending) = latest else {
                debug!("GET miss key={} (delete pending)", key);
                return false;
            };
            return match transfer(pending.as_ref(), item) {
                Ok(bytes) => {
                    debug!("GET key={}, size={} (pending write)", key, bytes);
                    true
                }
                Err(e) => {
                    debug!("GET key={} failed to decode pending write: {}", key, e);
                    false
                }
            };
        }

        let _layout = self.inner.layout.read();

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                debug!("GET miss key={} ({})", key, e);
                return false;
            }
        };

        match item.read_from(&mut BufReader::new(file)) {
            Ok(bytes) => {
                debug!("GET key={}, size={}", key, bytes);
                true
            }
            Err(e) => {
                debug!("GET key={} failed to decode: {}", key, e);
                false
            }
        }
    }

    fn set(&self, key: &str, item: Option<SharedItem>) -> Completion {
        let path = match key::to_path(self.root(), key) {
            Ok(path) => path,
            Err(e) => {
                warn!("SET rejected: {}", e);
                return Completion::ready(Err(e));
            }
        };

        let (tx, rx) = oneshot::channel();
        let key = key.to_string();

        let _layout = self.inner.layout.write();
        let task = InFlight::enter(&self.inner, &path, item.clone());

        self.handle.spawn_blocking(move || {
            let inner = Arc::clone(&task.inner);
            let generation = task.generation;
            let result = match item {
                Some(item) => inner.write(&path, generation, item.as_ref()),
                None => inner.remove(&key, &path, generation),
            };

            match &result {
                Ok(()) => debug!("SET key={} committed", key),
                Err(e) => warn!("SET key={} failed: {}", key, e),
            }

            drop(task);
            let _ = tx.send(result);
        });

        Completion::from_receiver(rx)
    }

    fn list(&self, prefix: &str) -> Vec<String> {
        let root = self.root();
        let _layout = self.inner.layout.read();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() {
                    return true;
                }
                relative_key(root, entry.path()).is_some_and(|k| key::dir_may_match(&k, prefix))
            });

        let mut keys = Vec::new();
        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let is_temp = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(TEMP_PREFIX));
            if is_temp {
                continue;
            }
            if let Some(k) = relative_key(root, entry.path()) {
                if k.starts_with(prefix) {
                    keys.push(k);
                }
            }
        }

        debug!("LIST prefix={:?} -> {} keys", prefix, keys.len());
        keys
    }

    fn flush(&self) -> Completion {
        // Sync failures are logged, never reported: the barrier cannot tell
        // which caller's write they belong to.
        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);

        self.handle.spawn(async move {
            inner.wait_idle().await;

            let barrier = Arc::clone(&inner);
            if let Err(e) = tokio::task::spawn_blocking(move || barrier.sync_dirty()).await {
                warn!("Flush barrier task failed: {}", e);
            }

            let _ = tx.send(Ok(()));
        });

        Completion::from_receiver(rx)
    }
}

impl Inner {
    fn write(&self, path: &Path, generation: u64, item: &dyn Item) -> Result<()> {
        if !self.is_latest(path, generation) {
            debug!("Write to {:?} superseded before it started", path);
            return Ok(());
        }

        let dir = path.parent().unwrap_or(self.config.root.as_path());
        create_dirs(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            item.write_to(&mut writer)?;
            writer.flush()?;
        }
        if self.config.fsync_mode == FsyncMode::Always {
            tmp.as_file().sync_all()?;
        }

        {
            let _layout = self.layout.write();
            if !self.is_latest(path, generation) {
                debug!("Write to {:?} superseded, discarding", path);
                return Ok(());
            }
            tmp.persist(path).map_err(|e| KvError::Io(e.error))?;
        }

        self.mark_dirty(path);
        Ok(())
    }

    fn remove(&self, key: &str, path: &Path, generation: u64) -> Result<()> {
        {
            let _layout = self.layout.write();
            if !self.is_latest(path, generation) {
                debug!("Delete of {:?} superseded, skipping", path);
                return Ok(());
            }
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(KvError::KeyNotFound(key.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.mark_dirty(path);
        Ok(())
    }

    /// Register a dispatched write and return its generation. Callers hold
    /// the layout write lock, so generations follow dispatch order.
    fn begin(&self, path: &Path, item: Option<SharedItem>) -> u64 {
        let mut pending = self.pending.lock();
        let entry = pending.entry(path.to_path_buf()).or_insert(Pending {
            generation: 0,
            writers: 0,
            latest: None,
        });
        entry.generation += 1;
        entry.writers += 1;
        entry.latest = item;
        entry.generation
    }

    fn is_latest(&self, path: &Path, generation: u64) -> bool {
        self.pending
            .lock()
            .get(path)
            .is_some_and(|p| p.generation == generation)
    }

    fn finish(&self, path: &Path) {
        let mut pending = self.pending.lock();
        if let Some(entry) = pending.get_mut(path) {
            entry.writers -= 1;
            if entry.writers == 0 {
                pending.remove(path);
            }
        }
    }

    /// Value of the newest write still running for `path`: `Some(None)` for a
    /// pending delete, `None` when nothing is in flight
    fn pending_value(&self, path: &Path) -> Option<Option<SharedItem>> {
        self.pending.lock().get(path).map(|p| p.latest.clone())
    }

    fn mark_dirty(&self, path: &Path) {
        if self.config.fsync_mode != FsyncMode::Never {
            self.dirty.lock().insert(path.to_path_buf());
        }
    }

    async fn wait_idle(&self) {
        loop {
            // Registered before the check so a wakeup in between is not lost
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Fsync what changed since the last flush, then the directories holding it
    fn sync_dirty(&self) {
        let paths: Vec<PathBuf> = self.dirty.lock().drain().collect();
        if paths.is_empty() {
            return;
        }

        let mut dirs = BTreeSet::new();
        let mut synced = 0usize;

        for path in &paths {
            // In `Always` mode files were synced before the rename
            if self.config.fsync_mode == FsyncMode::OnFlush {
                match File::open(path).and_then(|f| f.sync_all()) {
                    Ok(()) => synced += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => warn!("Failed to sync {:?}: {}", path, e),
                }
            }
            if let Some(parent) = path.parent() {
                dirs.insert(parent.to_path_buf());
            }
        }

        for dir in &dirs {
            if let Err(e) = sync_dir(dir) {
                warn!("Failed to sync directory {:?}: {}", dir, e);
            }
        }

        debug!(
            "Flush synced {} files in {} directories",
            synced,
            dirs.len()
        );
    }
}

/// Tracks one dispatched write; the last one to finish wakes pending flushes
struct InFlight {
    inner: Arc<Inner>,
    path: PathBuf,
    generation: u64,
}

impl InFlight {
    fn enter(inner: &Arc<Inner>, path: &Path, item: Option<SharedItem>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::AcqRel);
        let generation = inner.begin(path, item);
        Self {
            inner: Arc::clone(inner),
            path: path.to_path_buf(),
            generation,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.inner.finish(&self.path);
        if self.inner.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

fn create_dirs(dir: &Path) -> std::io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Unescaped key of `path` relative to `root`
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => segments.push(key::unescape_segment(name.to_str()?)?),
            _ => return None,
        }
    }
    Some(segments.join("/"))
}
