use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};

use crate::compute::{self, wait_cancelled, ChannelSink, EventSink, WorkerError};
use crate::config::errors::ERR_DUPLICATE_JOB;
use crate::core::{emit_or_log, remove_compute_job, SessionState};
use crate::events::{CommandFinal, CommandPartialEvent, OutputStream, SessionEvent, WorkerEvent};
use crate::policy::{
    classify_files, enforce_command_policy, CommandFinalErr, CommandFinalOk, CommandJobSpec,
};

#[derive(Debug, thiserror::Error)]
pub enum CommandCallError {
    #[error("E-OCC-0104: duplicate job id {0}")]
    Duplicate(String),
    #[error("{}", .0.message)]
    Policy(CommandFinalErr),
}

impl CommandCallError {
    pub fn code(&self) -> &str {
        match self {
            Self::Duplicate(_) => ERR_DUPLICATE_JOB,
            Self::Policy(deny) => &deny.code,
        }
    }
}

/// Dispatch one command. Events for the job flow to `sink` in emission order,
/// ending with exactly one `command-result-final` or `command-interrupted`.
///
/// On exit the returned file set is classified: user files merge into the
/// session store with a single notification and paths absent before dispatch
/// are reported as generated. Transport failures and cancellation leave the
/// store untouched.
pub async fn command_call(
    state: &Arc<SessionState>,
    spec: CommandJobSpec,
    sink: Arc<dyn EventSink>,
) -> Result<(), CommandCallError> {
    let _span = tracing::info_span!("command_call", job_id = %spec.job_id, command = %spec.command);

    // Reject duplicate job ids
    if state.compute_ongoing.read().await.contains_key(&spec.job_id)
        || state.compute_cancel.read().await.contains_key(&spec.job_id)
    {
        return Err(CommandCallError::Duplicate(spec.job_id));
    }

    if let Some(deny) = enforce_command_policy(&spec) {
        tracing::info!(target: "occ", job_id = %spec.job_id, code = %deny.code, "command denied by policy");
        return Err(CommandCallError::Policy(deny));
    }

    // INVARIANT: captured before dispatch; "generated" is relative to this set.
    let initial_keys: BTreeSet<String> = spec.files.keys().cloned().collect();

    let (cancel_tx, cancel_rx) = watch::channel(false);
    state
        .compute_cancel
        .write()
        .await
        .insert(spec.job_id.clone(), cancel_tx);

    // Hold the map lock across spawn so the job's own cleanup cannot run
    // before it is registered.
    let mut ongoing = state.compute_ongoing.write().await;
    let job_id = spec.job_id.clone();
    let join = tokio::spawn(run_job(
        Arc::clone(state),
        spec,
        initial_keys,
        cancel_rx,
        sink,
    ));
    ongoing.insert(job_id, join);
    Ok(())
}

async fn run_job(
    state: Arc<SessionState>,
    spec: CommandJobSpec,
    initial_keys: BTreeSet<String>,
    mut cancel_rx: watch::Receiver<bool>,
    sink: Arc<dyn EventSink>,
) {
    let job_id = spec.job_id.clone();

    // INVARIANT: a job waiting for a slot is already cancellable.
    let queued_at = Instant::now();
    let permit = tokio::select! {
        biased;
        _ = wait_cancelled(&mut cancel_rx) => None,
        permit = Arc::clone(&state.compute_sem).acquire_owned() => permit.ok(),
    };
    let Some(_permit) = permit else {
        if *cancel_rx.borrow() {
            tracing::info!(target: "occ", job_id = %job_id, "queued command interrupted");
            emit_or_log(sink.as_ref(), SessionEvent::CommandInterrupted { job_id: job_id.clone() });
        } else {
            let payload = CommandFinalErr::new(&job_id, "Command.Closed", "command host is shut down");
            emit_or_log(sink.as_ref(), SessionEvent::CommandResultFinal(CommandFinal::Err(payload)));
        }
        remove_compute_job(&state, &job_id).await;
        return;
    };
    let queue_wait_ms: u64 = queued_at.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
    tracing::info!(target: "occ", job_id = %job_id, wait_ms = queue_wait_ms, "command permit acquired");

    let started = Instant::now();
    let started_at = chrono::Utc::now().timestamp_millis();
    tracing::info!(target: "occ", job_id = %job_id, command = %spec.command, cwd = %spec.cwd, "command started");

    let mut worker = compute::spawn_worker(
        spec.to_request(),
        Arc::clone(&state.executor),
        cancel_rx.clone(),
    );
    let mut seq: u64 = 0;
    let metrics = |started: Instant| {
        serde_json::json!({
            "startedAt": started_at,
            "queueMs": queue_wait_ms,
            "durationMs": u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    };

    let channel_closed = loop {
        tokio::select! {
            biased;
            _ = wait_cancelled(&mut cancel_rx) => {
                // Output delivery stops here; the worker sees the same signal.
                tracing::info!(target: "occ", job_id = %job_id, "command interrupted");
                emit_or_log(sink.as_ref(), SessionEvent::CommandInterrupted { job_id: job_id.clone() });
                break false;
            }
            event = worker.events.recv() => match event {
                Some(WorkerEvent::Ready) => {
                    emit_or_log(sink.as_ref(), SessionEvent::CommandReady { job_id: job_id.clone() });
                }
                Some(WorkerEvent::Output { text }) => {
                    emit_or_log(sink.as_ref(), partial(&job_id, &mut seq, OutputStream::Stdout, text));
                }
                Some(WorkerEvent::Error { text }) => {
                    emit_or_log(sink.as_ref(), partial(&job_id, &mut seq, OutputStream::Stderr, text));
                }
                Some(WorkerEvent::Exit { code, files }) => {
                    let classified = classify_files(&files, &initial_keys);
                    let user_files: Vec<String> = classified.user_files.keys().cloned().collect();
                    state.store.merge(classified.user_files);
                    tracing::info!(
                        target: "occ",
                        job_id = %job_id,
                        exit_code = code,
                        merged = user_files.len(),
                        generated = classified.generated.len(),
                        "command exited"
                    );
                    let payload = CommandFinalOk {
                        ok: true,
                        job_id: job_id.clone(),
                        exit_code: code,
                        files,
                        user_files,
                        generated: classified.generated,
                        metrics: Some(metrics(started)),
                    };
                    emit_or_log(sink.as_ref(), SessionEvent::CommandResultFinal(CommandFinal::Ok(payload)));
                    break false;
                }
                None => break true,
            }
        }
    };

    if channel_closed {
        // Worker ended without `exit`: transport error, nothing is merged.
        let err = worker.failure().await;
        tracing::warn!(target: "occ", job_id = %job_id, error = %err, "command transport error");
        let mut payload = CommandFinalErr::new(&job_id, err.code(), err.to_string());
        payload.metrics = Some(metrics(started));
        emit_or_log(sink.as_ref(), SessionEvent::CommandResultFinal(CommandFinal::Err(payload)));
    }

    remove_compute_job(&state, &job_id).await;
}

fn partial(job_id: &str, seq: &mut u64, stream: OutputStream, text: String) -> SessionEvent {
    let ev = CommandPartialEvent {
        job_id: job_id.to_string(),
        seq: *seq,
        stream,
        text,
    };
    *seq += 1;
    SessionEvent::CommandResultPartial(ev)
}

/// Ask a running job to stop. Output delivery stops at once; if the job task
/// has not wound down after the grace period it is aborted. Unknown ids are
/// ignored.
pub async fn command_cancel(state: &Arc<SessionState>, job_id: &str) {
    tracing::info!(target: "occ", job_id = %job_id, "command_cancel invoked");

    // Signal cancellation to the job if it registered a cancel channel
    if let Some(tx) = state.compute_cancel.read().await.get(job_id).cloned() {
        let _ = tx.send(true);
    }

    let grace = Duration::from_millis(state.config.cancel_grace_ms);
    let jid = job_id.to_string();
    let state = Arc::clone(state);
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        let aborted = {
            let ongoing = state.compute_ongoing.read().await;
            if let Some(handle) = ongoing.get(&jid) {
                handle.abort();
                true
            } else {
                false
            }
        };
        if aborted {
            tracing::warn!(target: "occ", job_id = %jid, "command aborted after grace");
            remove_compute_job(&state, &jid).await;
        }
    });
}

// ----------------------------------------------------------------------------
// In-process consumption
// ----------------------------------------------------------------------------

/// How a dispatched command ended, as seen by an in-process caller.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    /// The program exited; `exit_code` may be non-zero.
    Exited(CommandFinalOk),
    /// The job failed before an exit was observed.
    Failed(CommandFinalErr),
    /// The caller cancelled the job.
    Interrupted { job_id: String },
}

/// A dispatched command whose events are consumed in-process.
pub struct RunningCommand {
    pub job_id: String,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    done: bool,
}

impl RunningCommand {
    /// Next event for this job; `None` after the final event.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.done {
            return None;
        }
        let ev = self.events.recv().await;
        match &ev {
            Some(SessionEvent::CommandResultFinal(_))
            | Some(SessionEvent::CommandInterrupted { .. })
            | None => self.done = true,
            _ => {}
        }
        ev
    }

    /// Drain to completion, handing each output line to `on_line`.
    pub async fn wait_with<F>(mut self, mut on_line: F) -> CommandOutcome
    where
        F: FnMut(&CommandPartialEvent),
    {
        while let Some(ev) = self.next_event().await {
            match ev {
                SessionEvent::CommandResultPartial(p) => on_line(&p),
                SessionEvent::CommandResultFinal(CommandFinal::Ok(ok)) => {
                    return CommandOutcome::Exited(ok)
                }
                SessionEvent::CommandResultFinal(CommandFinal::Err(err)) => {
                    return CommandOutcome::Failed(err)
                }
                SessionEvent::CommandInterrupted { job_id } => {
                    return CommandOutcome::Interrupted { job_id }
                }
                SessionEvent::CommandReady { .. } => {}
            }
        }
        // The job task was aborted before it could publish a final event.
        let err = WorkerError::NoExit("job ended without a final event".into());
        CommandOutcome::Failed(CommandFinalErr::new(&self.job_id, err.code(), err.to_string()))
    }

    pub async fn wait(self) -> CommandOutcome {
        self.wait_with(|_| {}).await
    }
}

/// Dispatch `spec` with a channel sink and return a handle to its events.
pub async fn run_command(
    state: &Arc<SessionState>,
    spec: CommandJobSpec,
) -> Result<RunningCommand, CommandCallError> {
    let job_id = spec.job_id.clone();
    let (sink, events) = ChannelSink::new();
    command_call(state, spec, sink).await?;
    Ok(RunningCommand {
        job_id,
        events,
        done: false,
    })
}
