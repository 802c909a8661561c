// tests/status_and_wipe.rs

use chrono::Duration;

use layerdag::types::NodeKind;
use layerdag_test_utils::builders::{ConfigFileBuilder, NodeConfigBuilder};
use layerdag_test_utils::{orchestrator, EngineCall, FakeEngine};

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// web (service) runs app (artifact) built on base (image).
fn stack() -> ConfigFileBuilder {
    ConfigFileBuilder::new()
        .with_node("base", NodeConfigBuilder::image("./base", "acme/base"))
        .with_node(
            "app",
            NodeConfigBuilder::artifact("base", "./target", "acme/app").artifact_file("app", "bin/app"),
        )
        .with_node("web", NodeConfigBuilder::service("app").command(&["app", "--serve"]))
}

#[tokio::test]
async fn status_reports_closure_without_building() -> TestResult {
    let engine = FakeEngine::new();
    let t0 = engine.now();
    engine.add_image("acme/base", t0 + Duration::minutes(5));
    engine.add_image("acme/app", t0);
    let orch = orchestrator(stack().build_graph(), &engine);

    let report = orch.status("web").await?;

    let summary: Vec<(&str, NodeKind, bool)> = report
        .iter()
        .map(|s| (s.name.as_str(), s.kind, s.stale))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("base", NodeKind::Image, false),
            // base is newer than app
            ("app", NodeKind::Artifact, true),
            ("web", NodeKind::Service, false),
        ]
    );
    assert_eq!(report[0].timestamp, Some(t0 + Duration::minutes(5)));
    assert_eq!(report[2].timestamp, None);
    assert!(!engine.calls().iter().any(EngineCall::is_mutation));
    Ok(())
}

#[tokio::test]
async fn status_propagates_staleness_to_dependents() -> TestResult {
    let engine = FakeEngine::new();
    let t0 = engine.now();
    engine.add_image("acme/app", t0);
    // base is missing, so its timestamp is unknown but app would still be rebuilt.
    let orch = orchestrator(stack().build_graph(), &engine);

    let report = orch.status("app").await?;

    assert_eq!(report.len(), 2);
    assert!(report[0].stale);
    assert_eq!(report[0].timestamp, None);
    assert!(report[1].stale);
    Ok(())
}

#[tokio::test]
async fn status_after_build_is_clean() -> TestResult {
    let engine = FakeEngine::new();
    let orch = orchestrator(stack().build_graph(), &engine);

    orch.ensure_built("web").await?;
    let report = orch.status("web").await?;

    assert!(report.iter().all(|s| !s.stale), "{report:?}");
    Ok(())
}

#[tokio::test]
async fn wipe_removes_dependents_first_and_skips_missing() -> TestResult {
    let engine = FakeEngine::new();
    let now = engine.now();
    engine.add_image("acme/base", now);
    engine.add_image("acme/app", now);
    let orch = orchestrator(stack().build_graph(), &engine);

    let removed = orch.wipe("web").await?;

    assert_eq!(removed, ["acme/app", "acme/base"]);
    assert!(!engine.has_image("acme/app"));
    assert!(!engine.has_image("acme/base"));

    engine.clear_calls();
    let removed = orch.wipe("web").await?;
    assert!(removed.is_empty());
    assert!(!engine.calls().iter().any(EngineCall::is_mutation));
    Ok(())
}

#[tokio::test]
async fn wipe_then_build_rebuilds_everything() -> TestResult {
    let engine = FakeEngine::new();
    let orch = orchestrator(stack().build_graph(), &engine);

    orch.ensure_built("app").await?;
    orch.wipe("app").await?;
    engine.clear_calls();
    orch.ensure_built("app").await?;

    let built = engine.calls().iter().filter(|c| c.is_build()).count();
    assert_eq!(built, 2);
    Ok(())
}
