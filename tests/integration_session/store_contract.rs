//! File store contract: snapshots, merges and subscriptions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use occ_playground::FileStore;

use super::files;

#[test]
fn merging_a_snapshot_back_is_a_no_op_diff() {
    let store = FileStore::with_files(files(&[("/water.xyz", "3\n"), ("/out/a.txt", "a")]));
    let before = store.get_all();
    store.merge(before.clone());
    assert_eq!(store.get_all(), before);
}

#[test]
fn write_then_read_returns_the_same_bytes() {
    let store = FileStore::new();
    let bytes: Vec<u8> = (0u8..=255).collect();
    store.write("/bin/blob.dat", bytes.clone());
    assert_eq!(store.get("/bin/blob.dat"), Some(bytes));
    assert_eq!(store.get("bin/blob.dat").map(|b| b.len()), Some(256));
}

#[test]
fn snapshot_is_detached_from_the_store() {
    let store = FileStore::with_files(files(&[("/a", "1")]));
    let mut snap = store.get_all();
    snap.insert("/b".into(), b"2".to_vec());
    assert!(!store.contains("/b"));
}

#[test]
fn merge_notifies_once_and_empty_merge_is_silent() {
    let store = FileStore::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let sub = store.subscribe(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    store.merge(files(&[("/a", "1"), ("/b", "2"), ("/c", "3")]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    store.merge(Default::default());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    sub.unsubscribe();
    store.write("/d", "4");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn load_or_seed_keeps_existing_content() {
    let store = FileStore::new();
    assert_eq!(store.load_or_seed("/input.toml", "x = 1"), b"x = 1");
    store.write("/input.toml", "x = 2");
    assert_eq!(store.load_or_seed("/input.toml", "x = 1"), b"x = 2");
}
