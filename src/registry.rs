use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::paths::MANIFEST_FILE;

/// One installed program build, e.g. `occ@0.7.2` as `occ-0.7.2.wasm`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgramEntry {
    pub program: String,       // e.g., "occ"
    pub version: String,       // e.g., "0.7.2"
    pub filename: String,      // e.g., "occ-0.7.2.wasm"
    pub digest_sha256: String, // hex-encoded
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProgramManifest {
    pub entries: Vec<ProgramEntry>,
}

#[derive(Debug, Clone)]
pub struct ProgramRef {
    pub entry: ProgramEntry,
    pub path: PathBuf,
}

/// Missing manifest means nothing is installed.
pub fn load_manifest(modules_dir: &Path) -> Result<ProgramManifest> {
    let manifest_path = modules_dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Ok(ProgramManifest::default());
    }
    let text = fs::read_to_string(&manifest_path)
        .with_context(|| format!("read manifest: {}", manifest_path.display()))?;
    let manifest: ProgramManifest =
        serde_json::from_str(&text).context("parse program manifest")?;
    Ok(manifest)
}

/// Resolve `name` or `name@version`. Without a version the last listed entry
/// for the program wins.
pub fn find_program(modules_dir: &Path, name_at_version: &str) -> Result<Option<ProgramRef>> {
    let (name, version) = name_at_version
        .split_once('@')
        .unwrap_or((name_at_version, ""));
    let manifest = load_manifest(modules_dir)?;
    let found = manifest
        .entries
        .into_iter()
        .filter(|e| e.program == name && (version.is_empty() || e.version == version))
        .last();
    Ok(found.map(|entry| {
        let path = modules_dir.join(&entry.filename);
        ProgramRef { entry, path }
    }))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn verify_digest(path: &Path, expected_hex: &str) -> Result<bool> {
    let bytes = fs::read(path).with_context(|| format!("read program: {}", path.display()))?;
    Ok(expected_hex.eq_ignore_ascii_case(&sha256_hex(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn digest_verification_detects_mismatch_and_match() {
        let mut f = NamedTempFile::new().expect("temp");
        writeln!(f, "occ").expect("write");
        let path = f.path().to_path_buf();
        let hex = sha256_hex(&std::fs::read(&path).expect("read"));
        assert!(verify_digest(&path, &hex).expect("verify"));
        assert!(verify_digest(&path, &hex.to_uppercase()).expect("verify upper"));
        assert!(!verify_digest(&path, "deadbeef").expect("verify bad"));
    }

    #[test]
    fn manifest_lookup_by_name_and_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest = serde_json::json!({
            "entries": [
                { "program": "occ", "version": "0.7.1", "filename": "occ-0.7.1.wasm", "digest_sha256": "aa" },
                { "program": "occ", "version": "0.7.2", "filename": "occ-0.7.2.wasm", "digest_sha256": "bb" }
            ]
        });
        std::fs::write(dir.path().join(MANIFEST_FILE), manifest.to_string()).expect("manifest");

        let latest = find_program(dir.path(), "occ").expect("lookup").expect("found");
        assert_eq!(latest.entry.version, "0.7.2");
        assert_eq!(latest.path, dir.path().join("occ-0.7.2.wasm"));
        let pinned = find_program(dir.path(), "occ@0.7.1").expect("lookup").expect("found");
        assert_eq!(pinned.entry.digest_sha256, "aa");
        assert!(find_program(dir.path(), "occ@9").expect("lookup").is_none());
    }

    #[test]
    fn missing_manifest_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_manifest(dir.path()).expect("load").entries.is_empty());
        assert!(find_program(dir.path(), "occ").expect("lookup").is_none());
    }
}
