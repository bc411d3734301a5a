//! WASI executor: runs an `occ.wasm` build in-process with wasmtime.
//!
//! The sandbox directory is preopened as the guest's `/`. Each invocation gets
//! a fresh `Store` and instance; only the compiled module is shared. Guest
//! output is captured in memory and delivered after the run finishes, stdout
//! lines first, then stderr lines.
//!
//! Epoch interruption is enabled on the engine. Dropping a run bumps the epoch
//! and flags that run as cancelled, so its guest traps at the next loop or
//! call boundary and the blocking thread is released. Other guests on the same
//! engine see the bump, find their own flag clear and keep going.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use wasmtime::{Config, Engine, Linker, Module, Store, UpdateDeadline};
use wasmtime_wasi::p1::{self, WasiP1Ctx};
use wasmtime_wasi::p2::pipe::MemoryOutputPipe;
use wasmtime_wasi::{DirPerms, FilePerms, I32Exit, WasiCtxBuilder};

use super::{Executor, Invocation, OutputSink, WorkerError};
use crate::config::paths::PROGRAM_NAME;
use crate::config::RunnerConfig;
use crate::registry;

/// Captured guest output cap per stream.
const PIPE_CAPACITY: usize = 16 * 1024 * 1024;

pub struct WasmExecutor {
    engine: Engine,
    module: Module,
}

impl WasmExecutor {
    /// Use `OCC_PROGRAM` directly when it names a `.wasm` file, otherwise
    /// resolve `occ` through the registry manifest and verify its digest.
    pub fn from_config(cfg: &RunnerConfig) -> Result<Self, WorkerError> {
        let direct = cfg
            .program
            .extension()
            .map(|ext| ext == "wasm")
            .unwrap_or(false);
        if direct {
            return Self::load(&cfg.program);
        }
        let found = registry::find_program(&cfg.modules_dir, PROGRAM_NAME)
            .map_err(|e| WorkerError::ProgramNotFound(format!("{e:#}")))?
            .ok_or_else(|| {
                WorkerError::ProgramNotFound(format!(
                    "{PROGRAM_NAME} in {}",
                    cfg.modules_dir.display()
                ))
            })?;
        let ok = registry::verify_digest(&found.path, &found.entry.digest_sha256)
            .map_err(|e| WorkerError::ProgramNotFound(format!("{e:#}")))?;
        if !ok {
            return Err(WorkerError::DigestMismatch(found.path.display().to_string()));
        }
        Self::load(&found.path)
    }

    pub fn load(path: &Path) -> Result<Self, WorkerError> {
        let program = path.display().to_string();
        let engine = build_engine(&program)?;
        let module = Module::from_file(&engine, path).map_err(|e| WorkerError::Spawn {
            program: program.clone(),
            reason: format!("compile: {e}"),
        })?;
        tracing::info!(target: "occ", module = %program, "wasm module compiled");
        Ok(Self { engine, module })
    }

    /// Compile a module from binary or text bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WorkerError> {
        let engine = build_engine(PROGRAM_NAME)?;
        let module = Module::new(&engine, bytes).map_err(|e| WorkerError::Spawn {
            program: PROGRAM_NAME.to_string(),
            reason: format!("compile: {e}"),
        })?;
        Ok(Self { engine, module })
    }
}

fn build_engine(program: &str) -> Result<Engine, WorkerError> {
    let mut cfg = Config::new();
    cfg.cranelift_opt_level(wasmtime::OptLevel::Speed)
        .epoch_interruption(true);
    Engine::new(&cfg).map_err(|e| WorkerError::Spawn {
        program: program.to_string(),
        reason: format!("engine: {e}"),
    })
}

/// Interrupts the guest of one run when dropped while still armed.
struct InterruptOnDrop {
    engine: Engine,
    cancelled: Arc<AtomicBool>,
    armed: bool,
}

impl InterruptOnDrop {
    fn new(engine: Engine) -> Self {
        Self {
            engine,
            cancelled: Arc::new(AtomicBool::new(false)),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.store(true, Ordering::SeqCst);
            self.engine.increment_epoch();
        }
    }
}

fn run_blocking(
    engine: &Engine,
    module: &Module,
    invocation: &Invocation,
    cancelled: Arc<AtomicBool>,
) -> Result<(i32, Vec<u8>, Vec<u8>), WorkerError> {
    let launch = |reason: String| WorkerError::Spawn {
        program: PROGRAM_NAME.to_string(),
        reason,
    };
    let stdout = MemoryOutputPipe::new(PIPE_CAPACITY);
    let stderr = MemoryOutputPipe::new(PIPE_CAPACITY);

    let mut argv = vec![PROGRAM_NAME.to_string()];
    argv.extend(invocation.args.iter().cloned());

    let mut builder = WasiCtxBuilder::new();
    builder
        .args(&argv)
        .env("PWD", &invocation.cwd)
        .stdout(stdout.clone())
        .stderr(stderr.clone());
    builder
        .preopened_dir(&invocation.root, "/", DirPerms::all(), FilePerms::all())
        .map_err(|e| launch(format!("preopen sandbox: {e}")))?;
    let wasi: WasiP1Ctx = builder.build_p1();

    let mut linker: Linker<WasiP1Ctx> = Linker::new(engine);
    p1::add_to_linker_sync(&mut linker, |cx| cx).map_err(|e| launch(format!("link: {e}")))?;
    let mut store = Store::new(engine, wasi);
    let flag = Arc::clone(&cancelled);
    store.set_epoch_deadline(1);
    store.epoch_deadline_callback(move |_| {
        if flag.load(Ordering::SeqCst) {
            Err(wasmtime::Error::msg("guest interrupted"))
        } else {
            Ok(UpdateDeadline::Continue(1))
        }
    });
    let instance = linker
        .instantiate(&mut store, module)
        .map_err(|e| launch(format!("instantiate: {e}")))?;
    let start = instance
        .get_typed_func::<(), ()>(&mut store, "_start")
        .map_err(|e| launch(format!("missing _start: {e}")))?;

    let code = match start.call(&mut store, ()) {
        Ok(()) => 0,
        Err(err) => match err.downcast_ref::<I32Exit>() {
            Some(exit) => exit.0,
            None if cancelled.load(Ordering::SeqCst) => return Err(WorkerError::Cancelled),
            None => {
                // Trap: report on stderr and fail like an aborted program.
                let mut err_bytes = stderr.contents().to_vec();
                err_bytes.extend_from_slice(format!("Module aborted: {err}\n").as_bytes());
                return Ok((1, stdout.contents().to_vec(), err_bytes));
            }
        },
    };
    Ok((code, stdout.contents().to_vec(), stderr.contents().to_vec()))
}

#[async_trait]
impl Executor for WasmExecutor {
    fn name(&self) -> &'static str {
        "wasm"
    }

    async fn run(&self, invocation: Invocation, out: OutputSink) -> Result<i32, WorkerError> {
        let engine = self.engine.clone();
        let module = self.module.clone();
        let mut interrupt = InterruptOnDrop::new(self.engine.clone());
        let cancelled = Arc::clone(&interrupt.cancelled);
        // Dropping this future drops `interrupt`, which stops the guest.
        let joined = tokio::task::spawn_blocking(move || {
            run_blocking(&engine, &module, &invocation, cancelled)
        })
        .await;
        interrupt.disarm();
        let (code, stdout, stderr) = joined.map_err(|e| WorkerError::NoExit(e.to_string()))??;
        for line in String::from_utf8_lossy(&stdout).lines() {
            out.stdout(line);
        }
        for line in String::from_utf8_lossy(&stderr).lines() {
            out.stderr(line);
        }
        Ok(code)
    }
}
