//! Interrupting a running command leaves the store exactly as it was.

use std::time::Duration;

use occ_playground::compute::{ChannelSink, Script};
use occ_playground::{command_call, command_cancel, CommandJobSpec, SessionEvent};

use super::{files, session};

#[tokio::test]
async fn cancel_leaves_store_byte_identical() {
    let state = session(
        Script::new()
            .stdout("iteration 1")
            .write_file("/water.xyz", "overwritten")
            .write_file("/water.owf.json", "{}")
            .hang(),
    );
    state.store.merge(files(&[("/water.xyz", "3\nWater\n"), ("/urea.cif", "data_urea\n")]));
    let before = state.store.get_all();
    let version = state.store.version();

    let (sink, mut events) = ChannelSink::new();
    let spec = CommandJobSpec::new("scf water.xyz", "/", state.store.get_all());
    let job_id = spec.job_id.clone();
    command_call(&state, spec, sink).await.expect("dispatch");

    // Wait until the program is producing output, then interrupt it.
    loop {
        match events.recv().await.expect("event") {
            SessionEvent::CommandResultPartial(_) => break,
            _ => continue,
        }
    }
    command_cancel(&state, &job_id).await;

    let last = tokio::time::timeout(Duration::from_secs(2), async {
        let mut last = None;
        while let Some(ev) = events.recv().await {
            let done = matches!(
                ev,
                SessionEvent::CommandInterrupted { .. } | SessionEvent::CommandResultFinal(_)
            );
            last = Some(ev);
            if done {
                break;
            }
        }
        last
    })
    .await
    .expect("job winds down");

    assert!(
        matches!(last, Some(SessionEvent::CommandInterrupted { .. })),
        "expected interrupted, got {last:?}"
    );
    assert_eq!(state.store.get_all(), before);
    assert_eq!(state.store.version(), version);
}

#[tokio::test]
async fn cancelling_unknown_jobs_is_harmless() {
    let state = session(Script::new().exit(0));
    command_cancel(&state, "no-such-job").await;
    assert!(state.running_jobs().await.is_empty());
}

#[tokio::test]
async fn job_is_released_after_cancel() {
    let state = session(Script::new().hang());
    let (sink, mut events) = ChannelSink::new();
    let spec = CommandJobSpec::new("opt", "/", Default::default());
    let job_id = spec.job_id.clone();
    command_call(&state, spec, sink).await.expect("dispatch");
    command_cancel(&state, &job_id).await;
    while let Some(ev) = events.recv().await {
        if matches!(ev, SessionEvent::CommandInterrupted { .. }) {
            break;
        }
    }
    for _ in 0..50 {
        if state.running_jobs().await.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} still registered");
}
