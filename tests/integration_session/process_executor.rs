//! Native process executor against a real child process.

use std::sync::Arc;

use occ_playground::compute::ProcessExecutor;
use occ_playground::config::RunnerConfig;
use occ_playground::{run_command, CommandJobSpec, CommandOutcome, OutputStream, SessionState};

use super::files;

#[tokio::test]
async fn shell_script_runs_in_sandbox_cwd() {
    let state = SessionState::new(RunnerConfig::default(), Arc::new(ProcessExecutor::new("sh")));
    // Arguments are passed through untouched; `run.sh` resolves against the
    // sandboxed working directory.
    let spec = CommandJobSpec::new(
        "run.sh",
        "/work",
        files(&[(
            "/work/run.sh",
            "cat input.txt\necho oops >&2\necho done > result.txt\nexit 4\n",
        ), ("/work/input.txt", "hello")]),
    );
    let mut lines = Vec::new();
    let outcome = run_command(&state, spec)
        .await
        .expect("dispatch")
        .wait_with(|p| lines.push((p.stream, p.text.clone())))
        .await;
    let CommandOutcome::Exited(ok) = outcome else {
        panic!("expected exit, got {outcome:?}");
    };
    assert_eq!(ok.exit_code, 4);
    assert!(lines.contains(&(OutputStream::Stdout, "hello".to_string())));
    assert!(lines.contains(&(OutputStream::Stderr, "oops".to_string())));
    assert_eq!(ok.generated, vec!["/work/result.txt".to_string()]);
    assert_eq!(state.store.get_text("/work/result.txt").as_deref(), Some("done\n"));
}
