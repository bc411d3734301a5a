//! Terminal driven by raw key input.

use std::sync::Arc;

use occ_playground::compute::ScriptedExecutor;
use occ_playground::config::RunnerConfig;
use occ_playground::terminal::{History, Mode, Terminal};
use occ_playground::SessionState;

fn terminal() -> (Arc<SessionState>, Terminal) {
    let state = SessionState::new(RunnerConfig::default(), Arc::new(ScriptedExecutor::demo()));
    let term = Terminal::new(Arc::clone(&state));
    (state, term)
}

#[test]
fn history_walks_by_index_without_mutation() {
    let mut history = History::new();
    history.push("ls");
    history.push("cat water.xyz");
    assert_eq!(history.previous(), Some("cat water.xyz"));
    assert_eq!(history.previous(), Some("ls"));
    assert_eq!(history.next(), Some("cat water.xyz"));
    assert_eq!(history.entries(), &["ls".to_string(), "cat water.xyz".to_string()]);
}

#[tokio::test]
async fn builtins_never_touch_the_shared_store() {
    let (state, mut term) = terminal();
    term.feed("mkdir work\rcd work\rpwd\rcat ../water.xyz\r").await;
    let out = term.take_output();
    assert!(out.contains("/work\r\n"), "{out:?}");
    assert!(out.contains("Water molecule"), "{out:?}");
    assert!(state.store.is_empty());
    assert!(state.running_jobs().await.is_empty());
}

#[tokio::test]
async fn missing_operands_return_to_idle() {
    let (_state, mut term) = terminal();
    term.feed("cat\r").await;
    term.feed("mkdir\r").await;
    let out = term.take_output();
    assert!(out.contains("cat: missing operand"));
    assert!(out.contains("mkdir: missing operand"));
    assert_eq!(term.mode(), Mode::Idle);
}

#[tokio::test]
async fn occ_run_syncs_vfs_and_merges_into_store() {
    let (state, mut term) = terminal();
    term.feed("occ scf water.xyz\r").await;
    assert_eq!(term.mode(), Mode::Running);
    term.run_until_idle().await;

    assert!(term.vfs().is_file("/water.owf.json"));
    assert!(state.store.contains("/water.owf.json"));
    // Seeded samples travel with the job and come back as user files.
    assert!(state.store.contains("/water.xyz"));
    assert!(term.take_output().contains("scf converged"));
}

#[tokio::test]
async fn occ_failure_output_is_shown_in_red() {
    let (_state, mut term) = terminal();
    term.feed("occ frobnicate\r").await;
    term.run_until_idle().await;
    let out = term.take_output();
    assert!(out.contains("\x1b[91merror: unrecognized arguments: frobnicate\x1b[0m"), "{out:?}");
    assert!(out.ends_with("/ $ "));
}

#[tokio::test]
async fn ctrl_c_clears_the_line_when_idle() {
    let (_state, mut term) = terminal();
    term.feed("cat wat").await;
    assert_eq!(term.line(), "cat wat");
    term.feed("\x03").await;
    assert_eq!(term.line(), "");
    assert!(term.take_output().contains("^C"));
}

#[tokio::test]
async fn backspace_edits_and_recall_resubmits() {
    let (_state, mut term) = terminal();
    term.feed("pwdd\x7f\r").await;
    assert_eq!(term.history().entries(), &["pwd".to_string()]);
    term.feed("\x1b[A\r").await;
    assert_eq!(term.history().len(), 2);
}
