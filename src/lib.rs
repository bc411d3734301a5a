pub mod policy;

pub use policy::{
    classify_files, enforce_command_policy, is_system_path, Classified, CommandFinalErr,
    CommandFinalOk, CommandJobSpec,
};

pub mod adapters;
pub mod commands;
pub mod compute;
pub mod config;
pub mod core;
pub mod events;
pub mod interactive;
pub mod outputs;
pub mod registry;
pub mod samples;
pub mod store;
pub mod terminal;
pub mod viewer;

pub use crate::core::{emit_or_log, init_tracing, remove_compute_job, SessionState, DATA_DIR};

pub use commands::{
    command_call, command_cancel, run_command, CommandCallError, CommandOutcome, RunningCommand,
};
pub use events::{CommandFinal, CommandPartialEvent, OutputStream, SessionEvent, WorkerEvent, WorkerRequest};
pub use store::{FileSet, FileStore, FileTree, StoreChange, Subscription, WeakFileStore};
