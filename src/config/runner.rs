use std::path::PathBuf;

use super::limits::{DEFAULT_CANCEL_GRACE_MS, DEFAULT_MAX_CONCURRENT_JOBS};
use super::paths::{MODULES_DIR, PROGRAM_NAME};

/// Which executor backs a worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    /// Native `occ` binary driven as a child process.
    Process,
    /// `occ.wasm` run in-process through wasmtime (feature `wasm_compute`).
    Wasm,
    /// Built-in scripted responder used by demos and tests.
    Scripted,
}

impl ExecutorKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "process" | "native" => Some(Self::Process),
            "wasm" | "wasi" => Some(Self::Wasm),
            "scripted" | "demo" => Some(Self::Scripted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub executor: ExecutorKind,
    pub program: PathBuf,
    pub modules_dir: PathBuf,
    pub max_concurrent: usize,
    pub cancel_grace_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorKind::Process,
            program: PathBuf::from(PROGRAM_NAME),
            modules_dir: crate::core::DATA_DIR.join(MODULES_DIR),
            max_concurrent: DEFAULT_MAX_CONCURRENT_JOBS,
            cancel_grace_ms: DEFAULT_CANCEL_GRACE_MS,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - OCC_EXECUTOR: `process` | `wasm` | `scripted` (default: process)
    /// - OCC_PROGRAM: program path or name on PATH (default: occ)
    /// - OCC_MODULES_DIR: directory holding `manifest.json` (default: <data dir>/modules)
    /// - OCC_MAX_CONCURRENT: concurrently running jobs (default: 2)
    /// - OCC_CANCEL_GRACE_MS: grace before a cancelled job is aborted (default: 250)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let executor = std::env::var("OCC_EXECUTOR")
            .ok()
            .and_then(|v| ExecutorKind::parse(&v))
            .unwrap_or(defaults.executor);

        let program = std::env::var("OCC_PROGRAM")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.program);

        let modules_dir = std::env::var("OCC_MODULES_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.modules_dir);

        let max_concurrent = std::env::var("OCC_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_concurrent);

        let cancel_grace_ms = std::env::var("OCC_CANCEL_GRACE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.cancel_grace_ms);

        Self {
            executor,
            program,
            modules_dir,
            max_concurrent,
            cancel_grace_ms,
        }
    }
}
