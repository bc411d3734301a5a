//! Pre-built command widgets.
//!
//! An [`InteractiveCommand`] holds one editable `occ ...` line plus inline
//! input files. Running it overlays the inputs on a snapshot of the session
//! store, streams the transcript into the output registry under the widget id
//! and reports which files the run generated.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::commands::{command_cancel, run_command, CommandCallError, CommandOutcome, RunningCommand};
use crate::config::errors::ERR_NOT_OCC;
use crate::config::paths::PROGRAM_NAME;
use crate::core::SessionState;
use crate::policy::CommandJobSpec;
use crate::store::{normalize_path, FileStore};

pub const INTERRUPTED_NOTICE: &str = "\n[Command interrupted by user]\n";

#[derive(Debug, thiserror::Error)]
pub enum InteractiveError {
    #[error("Command must start with \"occ\"")]
    NotOcc,
    #[error(transparent)]
    Dispatch(#[from] CommandCallError),
}

impl InteractiveError {
    pub fn code(&self) -> &str {
        match self {
            Self::NotOcc => ERR_NOT_OCC,
            Self::Dispatch(e) => e.code(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InteractiveCommand {
    id: Option<String>,
    command: String,
    edited: String,
    input_files: BTreeMap<String, String>,
    expected_outputs: Vec<String>,
}

impl InteractiveCommand {
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        Self {
            id: None,
            edited: command.clone(),
            command,
            input_files: BTreeMap::new(),
            expected_outputs: Vec::new(),
        }
    }

    /// Key under which the transcript is published to the output registry.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Inline input file placed at `/<name>` for every run.
    pub fn with_input(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.input_files.insert(name.into(), content.into());
        self
    }

    pub fn expect_output(mut self, path: impl Into<String>) -> Self {
        self.expected_outputs.push(path.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The line that will run, including any edits.
    pub fn command_line(&self) -> &str {
        &self.edited
    }

    pub fn edit(&mut self, line: impl Into<String>) {
        self.edited = line.into();
    }

    /// Discard edits and restore the original line.
    pub fn reset(&mut self) {
        self.edited = self.command.clone();
    }

    /// Expected outputs that are not yet in the store.
    pub fn missing_outputs(&self, store: &FileStore) -> Vec<String> {
        self.expected_outputs
            .iter()
            .filter(|p| !store.contains(p))
            .cloned()
            .collect()
    }

    /// Build the job: store snapshot with the inline inputs laid over it.
    pub fn prepare(&self, store: &FileStore) -> Result<CommandJobSpec, InteractiveError> {
        let mut parts = self.edited.split_whitespace();
        if parts.next() != Some(PROGRAM_NAME) {
            return Err(InteractiveError::NotOcc);
        }
        let args: Vec<&str> = parts.collect();
        let mut files = store.get_all();
        for (name, content) in &self.input_files {
            files.insert(normalize_path(name), content.as_bytes().to_vec());
        }
        Ok(CommandJobSpec::new(args.join(" "), "/", files))
    }

    pub async fn start(&self, state: &Arc<SessionState>) -> Result<InteractiveRun, InteractiveError> {
        let spec = self.prepare(&state.store)?;
        if let Some(id) = &self.id {
            state.outputs.set(id, "");
        }
        let running = run_command(state, spec).await?;
        tracing::info!(target: "occ", job_id = %running.job_id, widget = ?self.id, "interactive command started");
        Ok(InteractiveRun {
            state: Arc::clone(state),
            id: self.id.clone(),
            running,
        })
    }

    /// Start and wait for completion.
    pub async fn run(&self, state: &Arc<SessionState>) -> Result<RunReport, InteractiveError> {
        Ok(self.start(state).await?.finish().await)
    }
}

/// Cancels a run from another task.
#[derive(Clone)]
pub struct StopHandle {
    state: Arc<SessionState>,
    job_id: String,
}

impl StopHandle {
    pub async fn stop(&self) {
        command_cancel(&self.state, &self.job_id).await;
    }
}

pub struct InteractiveRun {
    state: Arc<SessionState>,
    id: Option<String>,
    running: RunningCommand,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Every output line followed by `\n`, in arrival order.
    pub output: String,
    /// User-facing error, if the run did not exit cleanly.
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    /// Paths that did not exist before the run.
    pub generated: Vec<String>,
    pub interrupted: bool,
}

impl InteractiveRun {
    pub fn job_id(&self) -> &str {
        &self.running.job_id
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: Arc::clone(&self.state),
            job_id: self.running.job_id.clone(),
        }
    }

    pub async fn finish(self) -> RunReport {
        let Self { state, id, running } = self;
        let mut report = RunReport::default();
        let publish = |output: &str| {
            if let Some(id) = &id {
                state.outputs.set(id, output);
            }
        };
        let outcome = running
            .wait_with(|line| {
                report.output.push_str(&line.text);
                report.output.push('\n');
                publish(&report.output);
            })
            .await;
        match outcome {
            CommandOutcome::Exited(ok) => {
                report.exit_code = Some(ok.exit_code);
                report.generated = ok.generated;
                if ok.exit_code != 0 {
                    report.error = Some(format!("Command exited with code {}", ok.exit_code));
                }
            }
            CommandOutcome::Failed(err) => report.error = Some(err.message),
            CommandOutcome::Interrupted { .. } => {
                report.interrupted = true;
                report.output.push_str(INTERRUPTED_NOTICE);
                publish(&report.output);
            }
        }
        report
    }
}
