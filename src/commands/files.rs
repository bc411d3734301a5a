//! Host directory import/export and upload helpers around the session store.

use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::store::{normalize_path, FileSet, FileStore, FileTree};

/// Read every regular file under `dir` into a slash-rooted file set.
/// Symlinks and directories are skipped.
pub fn import_dir(dir: &Path) -> Result<FileSet> {
    let _span = tracing::info_span!("import_dir", dir = %dir.display()).entered();
    let mut files = FileSet::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .with_context(|| format!("strip prefix {}", dir.display()))?;
        let key = format!(
            "/{}",
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        );
        let bytes =
            std::fs::read(entry.path()).with_context(|| format!("read {}", entry.path().display()))?;
        files.insert(key, bytes);
    }
    Ok(files)
}

/// Write `paths` from the store below `dest`, creating directories. Returns
/// how many files were written.
pub fn export_files(store: &FileStore, paths: &[String], dest: &Path) -> Result<usize> {
    std::fs::create_dir_all(dest).with_context(|| format!("create {}", dest.display()))?;
    let mut written = 0;
    for path in paths {
        let Some(bytes) = store.get(path) else {
            continue;
        };
        let rel = path.trim_start_matches('/');
        if rel.split('/').any(|seg| seg == "..") {
            anyhow::bail!("refusing to export path outside destination: {path}");
        }
        let target = dest.join(rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        std::fs::write(&target, bytes).with_context(|| format!("write {}", target.display()))?;
        written += 1;
    }
    tracing::info!(target: "occ", count = written, dest = %dest.display(), "files exported");
    Ok(written)
}

/// Store an uploaded file under `dir` (slash-rooted) using only its base name.
/// Returns the stored path.
pub fn upload_file(store: &FileStore, dir: &str, file_name: &str, bytes: Vec<u8>) -> Result<String> {
    let base = Path::new(file_name)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.trim().is_empty())
        .with_context(|| format!("invalid upload file name: {file_name:?}"))?;
    let dir = normalize_path(dir);
    let path = if dir == "/" {
        format!("/{base}")
    } else {
        format!("{}/{base}", dir.trim_end_matches('/'))
    };
    store.write(&path, bytes);
    Ok(path)
}

/// Indented listing of the whole store.
pub fn list_tree(store: &FileStore) -> Vec<String> {
    FileTree::from_paths(&store.paths()).render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_then_export_round_trips_through_the_store() {
        let src = tempfile::tempdir().expect("src");
        std::fs::create_dir_all(src.path().join("inputs")).expect("mkdir");
        std::fs::write(src.path().join("water.xyz"), "3\n").expect("write");
        std::fs::write(src.path().join("inputs/urea.cif"), "data_urea\n").expect("write");

        let files = import_dir(src.path()).expect("import");
        assert_eq!(
            files.keys().cloned().collect::<Vec<_>>(),
            vec!["/inputs/urea.cif".to_string(), "/water.xyz".to_string()]
        );

        let store = FileStore::with_files(files);
        let dest = tempfile::tempdir().expect("dest");
        let written = export_files(&store, &store.paths(), dest.path()).expect("export");
        assert_eq!(written, 2);
        assert_eq!(
            std::fs::read_to_string(dest.path().join("inputs/urea.cif")).expect("read"),
            "data_urea\n"
        );
    }

    #[test]
    fn upload_keeps_base_name_only() {
        let store = FileStore::new();
        let path = upload_file(&store, "/work", "../../etc/mol.xyz", b"1".to_vec()).expect("upload");
        assert_eq!(path, "/work/mol.xyz");
        let root = upload_file(&store, "/", "a.cif", b"2".to_vec()).expect("upload");
        assert_eq!(root, "/a.cif");
        assert!(upload_file(&store, "/", "..", Vec::new()).is_err());
    }

    #[test]
    fn tree_lists_nested_dirs() {
        let store = FileStore::new();
        store.write("/out/a.txt", b"".to_vec());
        store.write("/b.txt", b"".to_vec());
        assert_eq!(list_tree(&store), vec!["out/", "  a.txt", "b.txt"]);
    }
}
