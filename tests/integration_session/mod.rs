//! Session-level coverage. Every test builds its own `SessionState` with a
//! scripted executor unless it exercises the native process path.

mod adapters;
mod cancellation;
mod command_protocol;
#[cfg(unix)]
mod process_executor;
mod store_contract;
mod terminal_session;
mod widgets;

use std::sync::Arc;

use occ_playground::compute::{Script, ScriptedExecutor};
use occ_playground::config::RunnerConfig;
use occ_playground::{FileSet, SessionState};

pub fn session(script: Script) -> Arc<SessionState> {
    SessionState::new(RunnerConfig::default(), Arc::new(ScriptedExecutor::single(script)))
}

pub fn files(entries: &[(&str, &str)]) -> FileSet {
    entries
        .iter()
        .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
        .collect()
}
