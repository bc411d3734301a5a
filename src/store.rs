//! Shared session file store.
//!
//! One `FileStore` exists per session. It maps slash-rooted paths to raw bytes,
//! never stores directory entries, and pushes a change notification to every
//! subscriber after each mutation. Handles are cheap to clone and all clones
//! observe the same state.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use parking_lot::{Mutex, RwLock};

/// Absolute path -> file bytes.
pub type FileSet = BTreeMap<String, Vec<u8>>;

/// Delivered to subscribers after a mutation has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub version: u64,
    pub paths: Vec<String>,
}

type Listener = Arc<dyn Fn(&StoreChange) + Send + Sync>;

struct Inner {
    files: RwLock<FileSet>,
    version: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
}

#[derive(Clone)]
pub struct FileStore {
    inner: Arc<Inner>,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("files", &self.inner.files.read().len())
            .field("version", &self.version())
            .finish()
    }
}

/// Make a path slash-rooted: `water.xyz` -> `/water.xyz`. Nothing else about
/// the key changes, whitespace included.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

impl FileStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                files: RwLock::new(FileSet::new()),
                version: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    /// Build a store pre-populated with `files`. No notification is sent.
    pub fn with_files(files: FileSet) -> Self {
        let store = Self::new();
        {
            let mut guard = store.inner.files.write();
            for (path, bytes) in files {
                guard.insert(normalize_path(&path), bytes);
            }
        }
        store
    }

    /// Snapshot copy of every file. Mutating the copy does not touch the store.
    pub fn get_all(&self) -> FileSet {
        self.inner.files.read().clone()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.files.read().get(&normalize_path(path)).cloned()
    }

    /// UTF-8 view of a file, lossy for invalid sequences.
    pub fn get_text(&self, path: &str) -> Option<String> {
        self.get(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.inner.files.read().contains_key(&normalize_path(path))
    }

    pub fn paths(&self) -> Vec<String> {
        self.inner.files.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.files.read().is_empty()
    }

    /// Monotonic mutation counter. Starts at 0 and increments once per
    /// notifying mutation.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    /// Insert or overwrite a single file, then notify.
    pub fn write(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        let path = normalize_path(path);
        let version = {
            let mut guard = self.inner.files.write();
            guard.insert(path.clone(), bytes.into());
            self.inner.version.fetch_add(1, Ordering::SeqCst) + 1
        };
        tracing::debug!(target: "occ", path = %path, version, "store write");
        self.notify(StoreChange {
            version,
            paths: vec![path],
        });
    }

    /// Upsert every entry of `files` under one lock and send exactly one
    /// notification. An empty merge is a no-op.
    pub fn merge(&self, files: FileSet) {
        if files.is_empty() {
            return;
        }
        let (version, paths) = {
            let mut guard = self.inner.files.write();
            let mut paths = Vec::with_capacity(files.len());
            for (path, bytes) in files {
                let path = normalize_path(&path);
                paths.push(path.clone());
                guard.insert(path, bytes);
            }
            let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;
            (version, paths)
        };
        tracing::debug!(target: "occ", count = paths.len(), version, "store merge");
        self.notify(StoreChange { version, paths });
    }

    /// Return the current content of `path`, or write `initial` there first.
    pub fn load_or_seed(&self, path: &str, initial: &str) -> Vec<u8> {
        if let Some(existing) = self.get(path) {
            return existing;
        }
        self.write(path, initial.as_bytes().to_vec());
        initial.as_bytes().to_vec()
    }

    /// Register a listener. It stays registered until the returned
    /// `Subscription` is dropped or `unsubscribe` is called.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StoreChange) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::SeqCst);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Handle that does not keep the store alive.
    pub fn downgrade(&self) -> WeakFileStore {
        WeakFileStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    fn notify(&self, change: StoreChange) {
        // INVARIANT: listeners run outside every store lock so they may read
        // or write the store re-entrantly.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&change);
        }
    }
}

/// Non-owning [`FileStore`] handle, for listeners that must not keep the
/// store they observe alive.
#[derive(Clone)]
pub struct WeakFileStore {
    inner: Weak<Inner>,
}

impl WeakFileStore {
    pub fn upgrade(&self) -> Option<FileStore> {
        self.inner.upgrade().map(|inner| FileStore { inner })
    }
}

/// Disposer returned by [`FileStore::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    store: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

/// Directory view of a flat file set, grouped by path prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTree {
    pub dirs: BTreeMap<String, FileTree>,
    pub files: Vec<String>,
}

impl FileTree {
    pub fn from_paths<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut root = FileTree::default();
        for path in paths {
            let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
            let Some((file, dirs)) = parts.split_last() else {
                continue;
            };
            let mut node = &mut root;
            for dir in dirs {
                node = node.dirs.entry((*dir).to_string()).or_default();
            }
            node.files.push((*file).to_string());
        }
        root.sort();
        root
    }

    fn sort(&mut self) {
        self.files.sort();
        for child in self.dirs.values_mut() {
            child.sort();
        }
    }

    /// Indented listing: directories first (suffixed with `/`), then files.
    pub fn render(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.render_into(0, &mut out);
        out
    }

    fn render_into(&self, depth: usize, out: &mut Vec<String>) {
        let pad = "  ".repeat(depth);
        for (name, child) in &self.dirs {
            out.push(format!("{pad}{name}/"));
            child.render_into(depth + 1, out);
        }
        for file in &self.files {
            out.push(format!("{pad}{file}"));
        }
    }
}
