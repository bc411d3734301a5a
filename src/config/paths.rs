//! Path and directory configuration

/// Directory prefixes owned by the program image. Files under these are never
/// merged back into the shared store.
pub const SYSTEM_DIR_PREFIXES: &[&str] = &[
    "/basis/", "/methods/", "/solvent/", "/lib/", "/usr/", "/etc/", "/dev/",
];

/// Individual files owned by the program image.
pub const SYSTEM_FILES: &[&str] = &["/dev/null", "/sgdata.json"];

/// Program name expected at the start of interactive command lines.
pub const PROGRAM_NAME: &str = "occ";

/// Registry layout.
pub const MODULES_DIR: &str = "modules";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Prefix for per-job sandbox directories.
pub const SANDBOX_PREFIX: &str = "occ-job-";
