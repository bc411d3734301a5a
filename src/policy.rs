use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::errors::{ERR_EMPTY_COMMAND, ERR_INVALID_PATH, ERR_RELATIVE_CWD};
use crate::config::paths::{SYSTEM_DIR_PREFIXES, SYSTEM_FILES};
use crate::events::WorkerRequest;
use crate::store::FileSet;

/// Host-side specification for running one `occ` command.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommandJobSpec {
    pub job_id: String,
    /// Argument line excluding the program name.
    pub command: String,
    #[serde(default = "default_cwd")]
    pub cwd: String,
    /// Complete file set to materialize in the sandbox.
    #[serde(default, with = "crate::events::b64_files")]
    pub files: FileSet,
}

impl CommandJobSpec {
    pub fn new(command: impl Into<String>, cwd: impl Into<String>, files: FileSet) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            command: command.into(),
            cwd: cwd.into(),
            files,
        }
    }

    pub fn to_request(&self) -> WorkerRequest {
        WorkerRequest {
            command: self.command.clone(),
            cwd: self.cwd.clone(),
            files: self.files.clone(),
        }
    }
}

fn default_cwd() -> String {
    "/".into()
}

/// Terminal envelope for a command whose program ran to an exit.
///
/// A non-zero `exit_code` is still `ok`: the job completed and its files were
/// collected. Only transport failures use [`CommandFinalErr`].
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommandFinalOk {
    pub ok: bool,
    pub job_id: String,
    pub exit_code: i32,
    /// Complete post-execution file set, system files included.
    #[serde(with = "crate::events::b64_files")]
    pub files: FileSet,
    /// Non-system paths merged into the shared store.
    pub user_files: Vec<String>,
    /// User paths that did not exist before dispatch.
    pub generated: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
}

/// Terminal envelope for a command that never produced an exit.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommandFinalErr {
    pub ok: bool,
    pub job_id: String,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
}

impl CommandFinalErr {
    pub fn new(job_id: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            job_id: job_id.to_string(),
            code: code.to_string(),
            message: message.into(),
            metrics: None,
        }
    }
}

/// True for paths owned by the program image rather than the user.
pub fn is_system_path(path: &str) -> bool {
    SYSTEM_FILES.contains(&path) || SYSTEM_DIR_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Split of a returned file set into what the session keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    pub user_files: FileSet,
    pub generated: Vec<String>,
}

/// Drop system paths and mark user paths absent from `initial_keys` as
/// generated. `initial_keys` must be captured before the job is dispatched.
pub fn classify_files(files: &FileSet, initial_keys: &BTreeSet<String>) -> Classified {
    let mut out = Classified::default();
    for (path, bytes) in files {
        if is_system_path(path) {
            continue;
        }
        if !initial_keys.contains(path) {
            out.generated.push(path.clone());
        }
        out.user_files.insert(path.clone(), bytes.clone());
    }
    out
}

fn is_clean_absolute(path: &str) -> bool {
    path.starts_with('/') && !path.split('/').any(|seg| seg == "..")
}

/// Coarse request gate. Returns the error envelope to publish when the
/// request must not be dispatched.
pub fn enforce_command_policy(spec: &CommandJobSpec) -> Option<CommandFinalErr> {
    if spec.command.trim().is_empty() {
        return Some(CommandFinalErr::new(
            &spec.job_id,
            "Command.Invalid",
            format!("{ERR_EMPTY_COMMAND}: empty command line"),
        ));
    }
    if !is_clean_absolute(&spec.cwd) {
        return Some(CommandFinalErr::new(
            &spec.job_id,
            "Command.Invalid",
            format!("{ERR_RELATIVE_CWD}: cwd must be absolute: {}", spec.cwd),
        ));
    }
    if let Some(bad) = spec.files.keys().find(|p| !is_clean_absolute(p) || p.ends_with('/')) {
        return Some(CommandFinalErr::new(
            &spec.job_id,
            "Command.Invalid",
            format!("{ERR_INVALID_PATH}: invalid file path: {bad}"),
        ));
    }
    None
}
