//! Worker wire protocol and session event envelopes.
//!
//! `WorkerRequest`/`WorkerEvent` are the messages exchanged with a single
//! worker instance; file contents travel base64-encoded in JSON. `SessionEvent`
//! is what the controller publishes to its sinks while a command runs.

use serde::{Deserialize, Serialize};

use crate::policy::{CommandFinalErr, CommandFinalOk};
use crate::store::FileSet;

// WHY: Centralize event channel names so the terminal, widgets and bins agree.
pub const EVENT_COMMAND_READY: &str = "command-ready";
pub const EVENT_COMMAND_PARTIAL: &str = "command-result-partial";
pub const EVENT_COMMAND_FINAL: &str = "command-result-final";
pub const EVENT_COMMAND_INTERRUPTED: &str = "command-interrupted";

/// Request sent to a fresh worker instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// Argument line excluding the program name.
    pub command: String,
    pub cwd: String,
    #[serde(with = "b64_files")]
    pub files: FileSet,
}

impl WorkerRequest {
    /// Whitespace-tokenized arguments.
    pub fn args(&self) -> Vec<String> {
        self.command.split_whitespace().map(str::to_string).collect()
    }
}

/// Messages a worker emits, in order: `ready`, any number of `output`/`error`,
/// then exactly one `exit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerEvent {
    Ready,
    Output {
        text: String,
    },
    Error {
        text: String,
    },
    Exit {
        code: i32,
        #[serde(with = "b64_files")]
        files: FileSet,
    },
}

impl WorkerEvent {
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit { .. })
    }
}

/// Which stream an output line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of program output, tagged with its origin and arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPartialEvent {
    pub job_id: String,
    pub seq: u64,
    pub stream: OutputStream,
    pub text: String,
}

/// Published by the controller while a command is in flight.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    CommandReady { job_id: String },
    CommandResultPartial(CommandPartialEvent),
    CommandResultFinal(CommandFinal),
    #[serde(rename_all = "camelCase")]
    CommandInterrupted { job_id: String },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CommandReady { .. } => EVENT_COMMAND_READY,
            Self::CommandResultPartial(_) => EVENT_COMMAND_PARTIAL,
            Self::CommandResultFinal(_) => EVENT_COMMAND_FINAL,
            Self::CommandInterrupted { .. } => EVENT_COMMAND_INTERRUPTED,
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            Self::CommandReady { job_id } | Self::CommandInterrupted { job_id } => job_id,
            Self::CommandResultPartial(p) => &p.job_id,
            Self::CommandResultFinal(CommandFinal::Ok(ok)) => &ok.job_id,
            Self::CommandResultFinal(CommandFinal::Err(err)) => &err.job_id,
        }
    }
}

/// Terminal envelope: either the program exited (any code) or the job failed
/// before an exit could be observed.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommandFinal {
    Ok(CommandFinalOk),
    Err(CommandFinalErr),
}

/// Serde adapter: `FileSet` <-> `{ path: base64 }`.
pub mod b64_files {
    use std::collections::BTreeMap;

    use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
    use base64::Engine as _;
    use crate::store::FileSet;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(files: &FileSet, ser: S) -> Result<S::Ok, S::Error> {
        let encoded: BTreeMap<&str, String> = files
            .iter()
            .map(|(path, bytes)| (path.as_str(), BASE64_ENGINE.encode(bytes)))
            .collect();
        serde::Serialize::serialize(&encoded, ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<FileSet, D::Error> {
        let encoded: BTreeMap<String, String> = BTreeMap::deserialize(de)?;
        encoded
            .into_iter()
            .map(|(path, b64)| {
                BASE64_ENGINE
                    .decode(b64.as_bytes())
                    .map(|bytes| (path.clone(), bytes))
                    .map_err(|e| D::Error::custom(format!("file {path}: invalid base64: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn worker_events_use_type_tag() {
        let out = serde_json::to_value(WorkerEvent::Output { text: "hi".into() }).unwrap();
        assert_eq!(out, json!({ "type": "output", "text": "hi" }));
        let ready = serde_json::to_value(WorkerEvent::Ready).unwrap();
        assert_eq!(ready, json!({ "type": "ready" }));
    }

    #[test]
    fn exit_carries_base64_files() {
        let mut files = FileSet::new();
        files.insert("/out.txt".into(), b"abc".to_vec());
        let exit = WorkerEvent::Exit { code: 0, files };
        let value = serde_json::to_value(&exit).unwrap();
        assert_eq!(value, json!({ "type": "exit", "code": 0, "files": { "/out.txt": "YWJj" } }));
        let back: WorkerEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, exit);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let bad = json!({ "command": "--version", "cwd": "/", "files": { "/a": "@@" } });
        let err = serde_json::from_value::<WorkerRequest>(bad).unwrap_err();
        assert!(err.to_string().contains("/a"), "{err}");
    }

    #[test]
    fn request_args_split_on_whitespace() {
        let req = WorkerRequest {
            command: "  scf  water.xyz   b3lyp ".into(),
            cwd: "/".into(),
            files: FileSet::new(),
        };
        assert_eq!(req.args(), vec!["scf", "water.xyz", "b3lyp"]);
    }

    #[test]
    fn session_event_names_match_constants() {
        let ev = SessionEvent::CommandReady { job_id: "j1".into() };
        assert_eq!(ev.name(), EVENT_COMMAND_READY);
        assert_eq!(ev.job_id(), "j1");
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value, json!({ "event": "command-ready", "payload": { "jobId": "j1" } }));
    }
}
