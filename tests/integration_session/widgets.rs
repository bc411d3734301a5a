//! Command widgets, output snippets and viewer feeds working off one session.

use occ_playground::compute::Script;
use occ_playground::interactive::InteractiveCommand;
use occ_playground::outputs::SnippetSpec;
use occ_playground::viewer::{FileFeed, ViewerPayload};

use super::session;

#[tokio::test]
async fn widget_output_feeds_snippets_and_viewers() {
    let state = session(
        Script::new()
            .stdout("reading water.xyz")
            .stdout("total energy -74.963")
            .write_file(
                "/water_opt.xyz",
                "3\nE=-74.963\nO 0 0 0.1\nH 0 0.75 -0.47\nH 0 -0.75 -0.47\n",
            )
            .exit(0),
    );
    let mut feed = FileFeed::watch(&state.store, "water_opt.xyz");
    match feed.current() {
        ViewerPayload::Unavailable { message, .. } => {
            assert!(message.starts_with("File not found: /water_opt.xyz"))
        }
        other => panic!("unexpected {other:?}"),
    }

    let report = InteractiveCommand::new("occ opt water.xyz")
        .with_id("opt-water")
        .with_input("water.xyz", occ_playground::samples::WATER_XYZ)
        .run(&state)
        .await
        .expect("run");
    assert_eq!(report.generated, vec!["/water_opt.xyz".to_string()]);

    let snippet = state
        .outputs
        .snippet("opt-water", &SnippetSpec::new().pattern(r"total energy .*").expect("pattern"))
        .expect("captured");
    assert_eq!(snippet.text, "total energy -74.963");

    let ViewerPayload::Structure { pdb, .. } = feed.changed().await.expect("update") else {
        panic!("expected a structure");
    };
    assert_eq!(pdb.lines().filter(|l| l.starts_with("ATOM")).count(), 3);
}
