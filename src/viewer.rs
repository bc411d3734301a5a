//! Viewer feeds over the session store.
//!
//! A [`FileFeed`] follows one path and republishes a prepared payload every
//! time a store mutation touches it, so viewers never poll. [`DimerBrowser`]
//! lists the dimer structures a lattice-energy run writes into a directory.

use std::cmp::Ordering;

use futures_util::Stream;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::adapters::{cube_bounds, cube_range, CubeBounds, StructureFormat, ValueRange};
use crate::adapters::xyz::{format_energy, xyz_comment_energy};
use crate::store::{normalize_path, FileStore, Subscription};

pub const DEFAULT_ISOVALUE: f64 = 0.002;

/// What a viewer renders for one file.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerPayload {
    /// Structure converted to PDB text.
    Structure { path: String, pdb: String },
    /// Volumetric grid with the isovalue slider bounds.
    Volume {
        path: String,
        text: String,
        bounds: Option<CubeBounds>,
        range: ValueRange,
        isovalue: f64,
    },
    /// Not in the store yet, or not something a viewer can show.
    Unavailable { path: String, message: String },
}

impl ViewerPayload {
    pub fn is_ready(&self) -> bool {
        !matches!(self, Self::Unavailable { .. })
    }
}

/// Prepare `path` from the store's current contents.
pub fn prepare(store: &FileStore, path: &str) -> ViewerPayload {
    let path = normalize_path(path);
    let Some(text) = store.get_text(&path) else {
        return ViewerPayload::Unavailable {
            message: format!("File not found: {path}. Run the command above first."),
            path,
        };
    };
    match StructureFormat::from_path(&path) {
        Some(StructureFormat::Cube) => {
            let range = cube_range(&text);
            ViewerPayload::Volume {
                bounds: cube_bounds(&text),
                isovalue: range.clamp(DEFAULT_ISOVALUE),
                range,
                path,
                text,
            }
        }
        Some(format) => match format.to_pdb(&text) {
            Ok(pdb) => ViewerPayload::Structure { path, pdb },
            Err(e) => ViewerPayload::Unavailable {
                message: e.to_string(),
                path,
            },
        },
        None => ViewerPayload::Unavailable {
            message: format!("Unsupported file format: {path}"),
            path,
        },
    }
}

/// Live payload for one store path.
pub struct FileFeed {
    rx: watch::Receiver<ViewerPayload>,
    _subscription: Subscription,
}

impl FileFeed {
    pub fn watch(store: &FileStore, path: &str) -> Self {
        let path = normalize_path(path);
        let (tx, rx) = watch::channel(prepare(store, &path));
        // INVARIANT: the listener holds only a weak handle, so dropping the
        // last store handle drops the listener and its sender, ending the feed.
        let reader = store.downgrade();
        let subscription = store.subscribe(move |change| {
            if !change.paths.iter().any(|p| *p == path) {
                return;
            }
            if let Some(store) = reader.upgrade() {
                tx.send_replace(prepare(&store, &path));
            }
        });
        Self {
            rx,
            _subscription: subscription,
        }
    }

    pub fn current(&self) -> ViewerPayload {
        self.rx.borrow().clone()
    }

    /// Wait for the next update. `None` once every handle to the store has
    /// been dropped.
    pub async fn changed(&mut self) -> Option<ViewerPayload> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Current payload followed by every update.
    pub fn into_stream(self) -> FeedStream {
        FeedStream {
            inner: WatchStream::new(self.rx.clone()),
            _feed: self,
        }
    }
}

/// Stream form of a [`FileFeed`]; keeps the store subscription alive.
pub struct FeedStream {
    inner: WatchStream<ViewerPayload>,
    _feed: FileFeed,
}

impl Stream for FeedStream {
    type Item = ViewerPayload;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        std::pin::Pin::new(&mut self.inner).poll_next(cx)
    }
}

// SAFETY: static pattern, validated by the tests below.
static DIMER_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"dimer_(\d+)").expect("valid dimer pattern"));

fn dimer_index(name: &str) -> Option<u64> {
    DIMER_INDEX.captures(name)?.get(1)?.as_str().parse().ok()
}

/// `dimer_2` before `dimer_10`; anything else compares as text.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (dimer_index(a), dimer_index(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimerEntry {
    pub name: String,
    pub path: String,
    pub text: String,
    /// `-12.34 kJ/mol` from the comment line of XYZ files.
    pub energy: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DimerBrowser {
    dir: String,
    format: StructureFormat,
}

impl DimerBrowser {
    pub fn new(dir: &str, format: StructureFormat) -> Self {
        Self {
            dir: normalize_path(dir).trim_end_matches('/').to_string(),
            format,
        }
    }

    /// File names (relative to the directory) in natural order.
    pub fn list(&self, store: &FileStore) -> Vec<String> {
        let prefix = format!("{}/", self.dir);
        let suffix = format!(".{}", self.format.extension());
        let mut names: Vec<String> = store
            .paths()
            .into_iter()
            .filter(|p| p.ends_with(&suffix))
            .filter_map(|p| p.strip_prefix(&prefix).map(str::to_string))
            .collect();
        names.sort_by(|a, b| natural_cmp(a, b));
        names
    }

    pub fn entry(&self, store: &FileStore, name: &str) -> Option<DimerEntry> {
        let path = format!("{}/{}", self.dir, name);
        let text = store.get_text(&path)?;
        let energy = match self.format {
            StructureFormat::Xyz => xyz_comment_energy(&text).map(format_energy),
            _ => None,
        };
        Some(DimerEntry {
            name: name.to_string(),
            path,
            text,
            energy,
        })
    }

    /// First entry in natural order, the default selection.
    pub fn first(&self, store: &FileStore) -> Option<DimerEntry> {
        let name = self.list(store).into_iter().next()?;
        self.entry(store, &name)
    }
}
