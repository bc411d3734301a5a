//! Seams between the command host and its collaborators: the program
//! executor that runs inside a sandbox, and the sinks that receive session
//! events.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::WorkerError;
use crate::events::{SessionEvent, WorkerEvent};

/// Everything an executor needs to run one command.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Whitespace-tokenized arguments, program name excluded.
    pub args: Vec<String>,
    /// Virtual working directory, slash-rooted.
    pub cwd: String,
    /// Host directory that backs the virtual `/`.
    pub root: PathBuf,
}

impl Invocation {
    /// Host directory for the virtual cwd.
    pub fn host_cwd(&self) -> PathBuf {
        let rel = self.cwd.trim_start_matches('/');
        if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel)
        }
    }
}

/// Where an executor writes program output. Lines keep arrival order across
/// both streams because they share one channel.
#[derive(Clone)]
pub struct OutputSink {
    tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl OutputSink {
    pub fn new(tx: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        Self { tx }
    }

    pub fn stdout(&self, text: impl Into<String>) {
        let _ = self.tx.send(WorkerEvent::Output { text: text.into() });
    }

    pub fn stderr(&self, text: impl Into<String>) {
        let _ = self.tx.send(WorkerEvent::Error { text: text.into() });
    }
}

/// Runs the `occ` program against a prepared sandbox and returns its exit code.
///
/// Implementations must stop promptly when their future is dropped; that is
/// how cancellation reaches them.
#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, invocation: Invocation, out: OutputSink) -> Result<i32, WorkerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    /// The consumer went away; nobody will see this event.
    #[error("no receiver for {event} ({job_id})")]
    Closed { event: &'static str, job_id: String },
}

/// Receives every event the command host publishes.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SessionEvent) -> Result<(), EmitError>;
}

/// Forwards events into an unbounded channel for an in-process consumer.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SessionEvent) -> Result<(), EmitError> {
        self.tx.send(event).map_err(|rejected| EmitError::Closed {
            event: rejected.0.name(),
            job_id: rejected.0.job_id().to_string(),
        })
    }
}

/// Keeps every event in memory; handy for assertions.
#[derive(Default, Clone)]
pub struct InMemorySink(pub Arc<RwLock<Vec<SessionEvent>>>);

impl InMemorySink {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.0.read().clone()
    }
}

impl EventSink for InMemorySink {
    fn emit(&self, event: SessionEvent) -> Result<(), EmitError> {
        self.0.write().push(event);
        Ok(())
    }
}
