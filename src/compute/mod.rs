//! Worker host: one disposable worker per command.
//!
//! A worker creates a fresh sandbox, materializes the request's files, emits
//! `ready`, runs the program through an [`Executor`], then emits exactly one
//! `exit` carrying the complete resulting file set. The sandbox is removed
//! when the worker ends, including on cancellation. A worker that fails before
//! `exit` closes its channel and reports the failure through its join handle.

pub mod hostctx;
pub mod process;
pub mod sandbox;
pub mod scripted;
#[cfg(feature = "wasm_compute")]
pub mod wasm;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub use hostctx::{
    ChannelSink, EmitError, EventSink, Executor, InMemorySink, Invocation, OutputSink,
};
pub use process::ProcessExecutor;
pub use sandbox::Sandbox;
pub use scripted::{Script, ScriptedExecutor};

use crate::config::{ExecutorKind, RunnerConfig};
use crate::events::{WorkerEvent, WorkerRequest};

/// Failures that prevent a worker from reaching `exit`.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("E-OCC-0201: {0}")]
    Sandbox(String),
    #[error("E-OCC-0202: failed to launch {program}: {reason}")]
    Spawn { program: String, reason: String },
    #[error("E-OCC-0203: worker ended without exit: {0}")]
    NoExit(String),
    #[error("E-OCC-0204: collecting files failed: {0}")]
    Snapshot(String),
    #[error("E-OCC-0205: program not found: {0}")]
    ProgramNotFound(String),
    #[error("E-OCC-0206: digest mismatch for {0}")]
    DigestMismatch(String),
    #[error("worker cancelled")]
    Cancelled,
}

impl WorkerError {
    /// Stable machine-readable category for envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sandbox(_) | Self::Snapshot(_) => "Worker.Sandbox",
            Self::Spawn { .. } | Self::ProgramNotFound(_) | Self::DigestMismatch(_) => {
                "Worker.Launch"
            }
            Self::NoExit(_) => "Worker.NoExit",
            Self::Cancelled => "Worker.Cancelled",
        }
    }
}

/// A running worker: its ordered event stream and its completion.
pub struct WorkerHandle {
    pub events: mpsc::UnboundedReceiver<WorkerEvent>,
    pub join: JoinHandle<Result<(), WorkerError>>,
}

impl WorkerHandle {
    /// Resolve why the event channel closed without an `exit`.
    pub async fn failure(self) -> WorkerError {
        match self.join.await {
            Ok(Err(err)) => err,
            Ok(Ok(())) => WorkerError::NoExit("channel closed".into()),
            Err(join_err) if join_err.is_cancelled() => WorkerError::Cancelled,
            Err(join_err) => WorkerError::NoExit(join_err.to_string()),
        }
    }
}

/// Start a fresh worker for `request`. Never reused across commands.
pub fn spawn_worker(
    request: WorkerRequest,
    executor: Arc<dyn Executor>,
    cancel: watch::Receiver<bool>,
) -> WorkerHandle {
    let (tx, events) = mpsc::unbounded_channel();
    let join = tokio::spawn(run_worker(request, executor, tx, cancel));
    WorkerHandle { events, join }
}

async fn run_worker(
    request: WorkerRequest,
    executor: Arc<dyn Executor>,
    tx: mpsc::UnboundedSender<WorkerEvent>,
    mut cancel: watch::Receiver<bool>,
) -> Result<(), WorkerError> {
    let sandbox = Sandbox::create()?;
    sandbox.materialize(&request.files)?;
    sandbox.ensure_dir(&request.cwd)?;
    let _ = tx.send(WorkerEvent::Ready);

    let invocation = Invocation {
        args: request.args(),
        cwd: request.cwd.clone(),
        root: sandbox.root().to_path_buf(),
    };
    let out = OutputSink::new(tx.clone());

    // INVARIANT: dropping the executor future is the only cancellation path;
    // the sandbox outlives it and is removed when this function returns.
    let code = tokio::select! {
        biased;
        _ = wait_cancelled(&mut cancel) => return Err(WorkerError::Cancelled),
        res = executor.run(invocation, out) => res?,
    };

    let files = sandbox.snapshot()?;
    let _ = tx.send(WorkerEvent::Exit { code, files });
    Ok(())
}

/// Resolves once the flag flips to `true`. Pends forever if the sender is
/// dropped without cancelling.
pub(crate) async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Build the executor selected by configuration.
pub fn build_executor(cfg: &RunnerConfig) -> anyhow::Result<Arc<dyn Executor>> {
    match cfg.executor {
        ExecutorKind::Process => Ok(Arc::new(ProcessExecutor::new(cfg.program.clone()))),
        ExecutorKind::Scripted => Ok(Arc::new(ScriptedExecutor::demo())),
        #[cfg(feature = "wasm_compute")]
        ExecutorKind::Wasm => Ok(Arc::new(wasm::WasmExecutor::from_config(cfg)?)),
        #[cfg(not(feature = "wasm_compute"))]
        ExecutorKind::Wasm => {
            anyhow::bail!("wasm executor requested but the `wasm_compute` feature is disabled")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileSet;

    fn request(command: &str, files: FileSet) -> WorkerRequest {
        WorkerRequest {
            command: command.into(),
            cwd: "/".into(),
            files,
        }
    }

    async fn drain(mut handle: WorkerHandle) -> (Vec<WorkerEvent>, WorkerHandle) {
        let mut seen = Vec::new();
        while let Some(ev) = handle.events.recv().await {
            seen.push(ev);
        }
        (seen, handle)
    }

    #[tokio::test]
    async fn worker_emits_ready_output_then_exit() {
        let script = Script::new()
            .stdout("hello")
            .stderr("warn")
            .write_file("/result.txt", "done")
            .exit(0);
        let exec: Arc<dyn Executor> = Arc::new(ScriptedExecutor::single(script));
        let (_tx, rx) = watch::channel(false);
        let mut files = FileSet::new();
        files.insert("/in.txt".into(), b"in".to_vec());

        let (events, handle) = drain(spawn_worker(request("run", files), exec, rx)).await;
        assert_eq!(events.first(), Some(&WorkerEvent::Ready));
        assert_eq!(events[1], WorkerEvent::Output { text: "hello".into() });
        assert_eq!(events[2], WorkerEvent::Error { text: "warn".into() });
        match events.last() {
            Some(WorkerEvent::Exit { code, files }) => {
                assert_eq!(*code, 0);
                assert!(files.contains_key("/in.txt"));
                assert_eq!(files.get("/result.txt").map(Vec::as_slice), Some(&b"done"[..]));
            }
            other => panic!("expected exit, got {other:?}"),
        }
        assert!(handle.join.await.expect("join").is_ok());
    }

    #[tokio::test]
    async fn crashed_executor_closes_without_exit() {
        let exec: Arc<dyn Executor> =
            Arc::new(ScriptedExecutor::single(Script::new().stdout("partial").crash("boom")));
        let (_tx, rx) = watch::channel(false);
        let (events, handle) = drain(spawn_worker(request("run", FileSet::new()), exec, rx)).await;
        assert!(!events.iter().any(WorkerEvent::is_exit));
        let err = handle.failure().await;
        assert!(matches!(err, WorkerError::NoExit(ref m) if m.contains("boom")), "{err}");
    }

    #[tokio::test]
    async fn cancellation_stops_a_hanging_executor() {
        let exec: Arc<dyn Executor> =
            Arc::new(ScriptedExecutor::single(Script::new().stdout("started").hang()));
        let (tx, rx) = watch::channel(false);
        let mut handle = spawn_worker(request("run", FileSet::new()), exec, rx);
        assert_eq!(handle.events.recv().await, Some(WorkerEvent::Ready));
        assert_eq!(
            handle.events.recv().await,
            Some(WorkerEvent::Output { text: "started".into() })
        );
        tx.send(true).expect("cancel");
        let (rest, handle) = drain(handle).await;
        assert!(rest.is_empty());
        assert_eq!(handle.failure().await, WorkerError::Cancelled);
    }
}
