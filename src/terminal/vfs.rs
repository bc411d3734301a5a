//! The terminal's private in-memory filesystem.
//!
//! Built-ins operate here only. The shared `FileStore` stays authoritative and
//! the two are reconciled at the `occ` command boundary: the VFS contents are
//! sent as the job's file set and the returned file set is written back.

use std::collections::BTreeSet;

use crate::config::errors::{ERR_VFS_EXISTS, ERR_VFS_NOT_DIR, ERR_VFS_NOT_FOUND};
use crate::samples::sample_files;
use crate::store::FileSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VfsError {
    #[error("E-OCC-0401: {0}: No such file or directory")]
    NotFound(String),
    #[error("E-OCC-0402: {0}: Not a directory")]
    NotADirectory(String),
    #[error("E-OCC-0403: {0}: File exists")]
    AlreadyExists(String),
}

impl VfsError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => ERR_VFS_NOT_FOUND,
            Self::NotADirectory(_) => ERR_VFS_NOT_DIR,
            Self::AlreadyExists(_) => ERR_VFS_EXISTS,
        }
    }

    /// The message without code or path, as a shell would print it.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "No such file or directory",
            Self::NotADirectory(_) => "Not a directory",
            Self::AlreadyExists(_) => "File exists",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Entry names of a directory, sorted.
    Dir(Vec<String>),
    /// `ls` on a file prints the file's own name.
    File(String),
}

#[derive(Debug, Clone)]
pub struct Vfs {
    files: FileSet,
    dirs: BTreeSet<String>,
    cwd: String,
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs {
    /// Empty filesystem containing only `/`.
    pub fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        Self {
            files: FileSet::new(),
            dirs,
            cwd: "/".to_string(),
        }
    }

    /// Fresh filesystem with the sample structures at the root.
    pub fn seeded() -> Self {
        let mut vfs = Self::new();
        for (path, text) in sample_files() {
            vfs.write(path, text.as_bytes().to_vec());
        }
        vfs
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Absolute, normalized form of `path` relative to the working directory.
    pub fn resolve(&self, path: &str) -> String {
        let joined = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{}", self.cwd.trim_end_matches('/'), path)
        };
        let mut parts: Vec<&str> = Vec::new();
        for seg in joined.split('/') {
            match seg {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                s => parts.push(s),
            }
        }
        format!("/{}", parts.join("/"))
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let abs = self.resolve(path);
        self.dirs.contains(&abs)
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.files.contains_key(&self.resolve(path))
    }

    pub fn list(&self, path: &str) -> Result<Listing, VfsError> {
        let abs = self.resolve(path);
        if let Some(name) = self.files.get_key_value(&abs).map(|(k, _)| base_name(k)) {
            return Ok(Listing::File(name.to_string()));
        }
        if !self.dirs.contains(&abs) {
            return Err(VfsError::NotFound(path.to_string()));
        }
        let prefix = if abs == "/" { "/".to_string() } else { format!("{abs}/") };
        let children = |p: &String| -> Option<String> {
            let rest = p.strip_prefix(&prefix)?;
            (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
        };
        let mut names: BTreeSet<String> = self.dirs.iter().filter_map(children).collect();
        names.extend(self.files.keys().filter_map(children));
        Ok(Listing::Dir(names.into_iter().collect()))
    }

    pub fn read(&self, path: &str) -> Result<&[u8], VfsError> {
        self.files
            .get(&self.resolve(path))
            .map(Vec::as_slice)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    /// Write a file, creating missing parent directories.
    pub fn write(&mut self, path: &str, bytes: Vec<u8>) -> String {
        let abs = self.resolve(path);
        self.ensure_parents(&abs);
        self.files.insert(abs.clone(), bytes);
        abs
    }

    /// Create one directory. The parent must exist.
    pub fn mkdir(&mut self, path: &str) -> Result<(), VfsError> {
        let abs = self.resolve(path);
        if self.dirs.contains(&abs) || self.files.contains_key(&abs) {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }
        let parent = parent_of(&abs);
        if self.files.contains_key(parent) {
            return Err(VfsError::NotADirectory(path.to_string()));
        }
        if !self.dirs.contains(parent) {
            return Err(VfsError::NotFound(path.to_string()));
        }
        self.dirs.insert(abs);
        Ok(())
    }

    pub fn chdir(&mut self, path: &str) -> Result<&str, VfsError> {
        let abs = self.resolve(path);
        if self.files.contains_key(&abs) {
            return Err(VfsError::NotADirectory(path.to_string()));
        }
        if !self.dirs.contains(&abs) {
            return Err(VfsError::NotFound(path.to_string()));
        }
        self.cwd = abs;
        Ok(&self.cwd)
    }

    /// Every file, as sent to a job.
    pub fn files(&self) -> FileSet {
        self.files.clone()
    }

    /// Write back the file set a job returned. Files are upserted; nothing is
    /// removed.
    pub fn sync(&mut self, files: &FileSet) {
        for (path, bytes) in files {
            self.write(path, bytes.clone());
        }
    }

    fn ensure_parents(&mut self, abs: &str) {
        let mut dir = parent_of(abs);
        while dir != "/" && self.dirs.insert(dir.to_string()) {
            dir = parent_of(dir);
        }
    }
}

fn parent_of(abs: &str) -> &str {
    match abs.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &abs[..i],
    }
}

fn base_name(abs: &str) -> &str {
    abs.rsplit('/').next().unwrap_or(abs)
}
