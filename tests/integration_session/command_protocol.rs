//! Command host: dispatch, classification, transport failures and the wire
//! format seen by external workers.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use occ_playground::compute::{InMemorySink, Script, ScriptedExecutor};
use occ_playground::config::RunnerConfig;
use occ_playground::events::EVENT_COMMAND_FINAL;
use occ_playground::{
    classify_files, command_call, run_command, CommandFinal, CommandJobSpec, CommandOutcome,
    SessionEvent, SessionState, WorkerEvent, WorkerRequest,
};
use serde_json::json;

use super::{files, session};

#[tokio::test]
async fn system_paths_never_reach_the_store() {
    let state = session(
        Script::new()
            .write_file("/basis/sto-3g.json", "{}")
            .write_file("/methods/b3lyp.json", "{}")
            .write_file("/sgdata.json", "{}")
            .write_file("/dev/null", "")
            .write_file("/results/water.owf.json", "{}")
            .exit(0),
    );
    let spec = CommandJobSpec::new("scf water.xyz", "/", files(&[("/water.xyz", "3")]));
    let outcome = run_command(&state, spec).await.expect("dispatch").wait().await;
    let CommandOutcome::Exited(ok) = outcome else {
        panic!("expected exit, got {outcome:?}");
    };
    assert_eq!(ok.generated, vec!["/results/water.owf.json".to_string()]);
    assert_eq!(
        state.store.paths(),
        vec!["/results/water.owf.json".to_string(), "/water.xyz".to_string()]
    );
    assert!(ok.files.contains_key("/basis/sto-3g.json"));
}

#[test]
fn generated_is_relative_to_the_pre_dispatch_keys() {
    let returned = files(&[("/a.txt", "1"), ("/b.txt", "2"), ("/usr/share/x", "3")]);
    let initial: BTreeSet<String> = ["/a.txt".to_string()].into_iter().collect();
    let classified = classify_files(&returned, &initial);
    assert_eq!(classified.generated, vec!["/b.txt".to_string()]);
    assert_eq!(classified.user_files.len(), 2);
}

#[tokio::test]
async fn worker_crash_is_a_transport_error_and_merges_nothing() {
    let state = session(
        Script::new()
            .stdout("starting")
            .write_file("/partial.txt", "half")
            .crash("module trapped"),
    );
    state.store.write("/keep.txt", "k");
    let before = state.store.get_all();
    let sink = InMemorySink::default();
    command_call(
        &state,
        CommandJobSpec::new("scf", "/", before.clone()),
        Arc::new(sink.clone()),
    )
    .await
    .expect("dispatch");

    let final_event = wait_for_final(&sink).await;
    let SessionEvent::CommandResultFinal(CommandFinal::Err(err)) = final_event else {
        panic!("expected transport error, got {final_event:?}");
    };
    assert!(err.message.contains("module trapped"), "{}", err.message);
    assert_eq!(state.store.get_all(), before);
}

#[tokio::test]
async fn launch_failure_is_reported_not_panicked() {
    let mut cfg = RunnerConfig::default();
    cfg.program = "/definitely/not/an/occ/binary".into();
    let executor = Arc::new(occ_playground::compute::ProcessExecutor::new(cfg.program.clone()));
    let state = SessionState::new(cfg, executor);
    let spec = CommandJobSpec::new("--version", "/", Default::default());
    let outcome = run_command(&state, spec).await.expect("dispatch").wait().await;
    let CommandOutcome::Failed(err) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(err.code, "Worker.Launch");
    assert!(state.store.is_empty());
}

#[tokio::test]
async fn concurrency_cap_queues_extra_jobs() {
    let cfg = RunnerConfig {
        max_concurrent: 1,
        ..RunnerConfig::default()
    };
    let executor = Arc::new(ScriptedExecutor::single(Script::new().sleep_ms(80).exit(0)));
    let state = SessionState::new(cfg, executor);

    let first = run_command(&state, CommandJobSpec::new("a", "/", Default::default()));
    let second = run_command(&state, CommandJobSpec::new("b", "/", Default::default()));
    let (first, second) = tokio::join!(
        async { first.await.expect("first").wait().await },
        async { second.await.expect("second").wait().await }
    );
    let queue_ms = |outcome: &CommandOutcome| match outcome {
        CommandOutcome::Exited(ok) => ok
            .metrics
            .as_ref()
            .and_then(|m| m.get("queueMs"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        other => panic!("expected exit, got {other:?}"),
    };
    let waits = [queue_ms(&first), queue_ms(&second)];
    assert!(waits.iter().any(|w| *w >= 50), "one job should queue: {waits:?}");
}

#[test]
fn wire_messages_match_the_worker_protocol() {
    let request: WorkerRequest = serde_json::from_value(json!({
        "command": "scf water.xyz",
        "cwd": "/",
        "files": { "/water.xyz": "Mw==" }
    }))
    .expect("request decodes");
    assert_eq!(request.files["/water.xyz"], b"3");

    let events: Vec<WorkerEvent> = serde_json::from_value(json!([
        { "type": "ready" },
        { "type": "output", "text": "reading water.xyz" },
        { "type": "error", "text": "warning: default basis" },
        { "type": "exit", "code": 0, "files": { "/water.owf.json": "e30=" } }
    ]))
    .expect("events decode");
    assert_eq!(events.len(), 4);
    assert!(events[3].is_exit());
    let WorkerEvent::Exit { files, .. } = &events[3] else {
        unreachable!()
    };
    assert_eq!(files["/water.owf.json"], b"{}");
}

#[tokio::test]
async fn final_payload_serializes_with_camel_case_fields() {
    let state = session(Script::new().stdout("ok").exit(0));
    let sink = InMemorySink::default();
    command_call(
        &state,
        CommandJobSpec::new("--version", "/", Default::default()),
        Arc::new(sink.clone()),
    )
    .await
    .expect("dispatch");
    let final_event = wait_for_final(&sink).await;
    let value = serde_json::to_value(&final_event).expect("serialize");
    assert_eq!(value["event"], EVENT_COMMAND_FINAL);
    assert_eq!(value["payload"]["ok"], true);
    assert_eq!(value["payload"]["exitCode"], 0);
    assert!(value["payload"]["jobId"].is_string());
}

async fn wait_for_final(sink: &InMemorySink) -> SessionEvent {
    for _ in 0..200 {
        if let Some(ev) = sink
            .events()
            .into_iter()
            .find(|e| matches!(e, SessionEvent::CommandResultFinal(_)))
        {
            return ev;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no final event within 2s");
}
