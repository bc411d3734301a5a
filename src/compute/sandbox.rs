//! Disposable per-job directory that backs the program's virtual filesystem.

use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

use super::WorkerError;
use crate::config::paths::SANDBOX_PREFIX;
use crate::store::FileSet;

/// A fresh directory per job. Removed when dropped, whatever the outcome.
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn create() -> Result<Self, WorkerError> {
        let dir = tempfile::Builder::new()
            .prefix(SANDBOX_PREFIX)
            .tempdir()
            .map_err(|e| WorkerError::Sandbox(format!("create sandbox: {e}")))?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Host path for a slash-rooted virtual path. Rejects `..` and anything
    /// that would escape the sandbox.
    pub fn host_path(&self, virtual_path: &str) -> Result<PathBuf, WorkerError> {
        let rel = Path::new(virtual_path.trim_start_matches('/'));
        for comp in rel.components() {
            match comp {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(WorkerError::Sandbox(format!(
                        "path escapes sandbox: {virtual_path}"
                    )))
                }
            }
        }
        Ok(self.root().join(rel))
    }

    /// Write every file, creating parent directories as needed.
    pub fn materialize(&self, files: &FileSet) -> Result<(), WorkerError> {
        for (path, bytes) in files {
            let host = self.host_path(path)?;
            if let Some(parent) = host.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| WorkerError::Sandbox(format!("mkdir {}: {e}", parent.display())))?;
            }
            std::fs::write(&host, bytes)
                .map_err(|e| WorkerError::Sandbox(format!("write {path}: {e}")))?;
        }
        Ok(())
    }

    /// Make sure the virtual cwd exists so the program can start in it.
    pub fn ensure_dir(&self, virtual_dir: &str) -> Result<PathBuf, WorkerError> {
        let host = self.host_path(virtual_dir)?;
        std::fs::create_dir_all(&host)
            .map_err(|e| WorkerError::Sandbox(format!("mkdir {virtual_dir}: {e}")))?;
        Ok(host)
    }

    /// Recursively collect every regular file as a slash-rooted path.
    pub fn snapshot(&self) -> Result<FileSet, WorkerError> {
        let mut files = FileSet::new();
        for entry in WalkDir::new(self.root()).follow_links(false) {
            let entry = entry.map_err(|e| WorkerError::Snapshot(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(self.root())
                .map_err(|e| WorkerError::Snapshot(e.to_string()))?;
            let virtual_path = format!(
                "/{}",
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            );
            let bytes = std::fs::read(entry.path())
                .map_err(|e| WorkerError::Snapshot(format!("read {virtual_path}: {e}")))?;
            files.insert(virtual_path, bytes);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_then_snapshot_returns_same_files() {
        let sbx = Sandbox::create().expect("sandbox");
        let mut files = FileSet::new();
        files.insert("/water.xyz".into(), b"3\n".to_vec());
        files.insert("/deep/nested/out.txt".into(), b"x".to_vec());
        sbx.materialize(&files).expect("materialize");
        assert_eq!(sbx.snapshot().expect("snapshot"), files);
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let sbx = Sandbox::create().expect("sandbox");
        assert!(sbx.host_path("/../outside").is_err());
        assert!(sbx.host_path("/ok/./file").is_ok());
    }

    #[test]
    fn directory_is_removed_on_drop() {
        let sbx = Sandbox::create().expect("sandbox");
        let root = sbx.root().to_path_buf();
        sbx.ensure_dir("/out").expect("mkdir");
        assert!(root.exists());
        drop(sbx);
        assert!(!root.exists());
    }

    #[test]
    fn empty_directories_are_not_files() {
        let sbx = Sandbox::create().expect("sandbox");
        sbx.ensure_dir("/empty/dir").expect("mkdir");
        assert!(sbx.snapshot().expect("snapshot").is_empty());
    }
}
