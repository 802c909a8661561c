// tests/ensure_running.rs

use layerdag::errors::LayerdagError;
use layerdag_test_utils::builders::{ConfigFileBuilder, NodeConfigBuilder};
use layerdag_test_utils::{orchestrator, EngineCall, FakeEngine};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn runs(engine: &FakeEngine) -> Vec<(bool, Vec<String>)> {
    engine
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            EngineCall::RunContainer { detached, args } => Some((detached, args)),
            _ => None,
        })
        .collect()
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// worker links to db; both run images that already exist.
fn worker_and_db() -> ConfigFileBuilder {
    ConfigFileBuilder::new()
        .with_node("dbimage", NodeConfigBuilder::image("./db", "mydb"))
        .with_node("workerimage", NodeConfigBuilder::image("./worker", "workerimage"))
        .with_node("db", NodeConfigBuilder::service("dbimage"))
        .with_node(
            "worker",
            NodeConfigBuilder::service("workerimage").link("db").command(&["serve"]),
        )
}

fn engine_with_images(tags: &[&str]) -> FakeEngine {
    let engine = FakeEngine::new();
    let now = engine.now();
    for tag in tags {
        engine.add_image(tag, now);
    }
    engine
}

#[tokio::test]
async fn detached_run_links_dependencies_and_returns_id() -> TestResult {
    let engine = engine_with_images(&["mydb", "workerimage"]);
    engine.run_as("mydb", "db_1", "mydb_c1");
    engine.run_as("workerimage", "worker_1", "worker_c1");
    let orch = orchestrator(worker_and_db().build_graph(), &engine);

    let id = orch.ensure_running("worker", false).await?;

    assert_eq!(id, "worker_1");
    assert_eq!(
        runs(&engine),
        vec![
            (true, strings(&["mydb"])),
            (true, strings(&["--link", "mydb_c1:db", "workerimage", "serve"])),
        ]
    );
    assert!(!engine.calls().iter().any(EngineCall::is_build));
    Ok(())
}

#[tokio::test]
async fn tee_run_is_attached_and_returns_empty_id() -> TestResult {
    let engine = engine_with_images(&["mydb", "workerimage"]);
    engine.run_as("mydb", "db_1", "mydb_c1");
    let orch = orchestrator(worker_and_db().build_graph(), &engine);

    let id = orch.ensure_running("worker", true).await?;

    assert_eq!(id, "");
    let runs = runs(&engine);
    // Link dependencies always start detached.
    assert_eq!(runs[0], (true, strings(&["mydb"])));
    assert_eq!(
        runs[1],
        (false, strings(&["--link", "mydb_c1:db", "workerimage", "serve"]))
    );
    Ok(())
}

#[tokio::test]
async fn links_follow_declaration_order() -> TestResult {
    let graph = ConfigFileBuilder::new()
        .with_node("img", NodeConfigBuilder::image("./img", "acme/img"))
        .with_node("zimg", NodeConfigBuilder::image("./z", "acme/z"))
        .with_node("yimg", NodeConfigBuilder::image("./y", "acme/y"))
        .with_node("ximg", NodeConfigBuilder::image("./x", "acme/x"))
        .with_node("x", NodeConfigBuilder::service("ximg"))
        .with_node("y", NodeConfigBuilder::service("yimg"))
        .with_node("z", NodeConfigBuilder::service("zimg"))
        .with_node(
            "app",
            NodeConfigBuilder::service("img").link("z").link("x").link("y"),
        )
        .build_graph();
    let engine = engine_with_images(&["acme/img", "acme/x", "acme/y", "acme/z"]);
    engine.run_as("acme/x", "x1", "cx");
    engine.run_as("acme/y", "y1", "cy");
    engine.run_as("acme/z", "z1", "cz");
    let orch = orchestrator(graph, &engine);

    for _ in 0..3 {
        engine.clear_calls();
        orch.ensure_running("app", false).await?;

        let (_, args) = runs(&engine).pop().expect("app was started");
        assert_eq!(
            args,
            strings(&["--link", "cz:z", "--link", "cx:x", "--link", "cy:y", "acme/img"])
        );
    }
    Ok(())
}

#[tokio::test]
async fn shared_link_dependency_starts_once() -> TestResult {
    // web links cache and api; api links cache too.
    let graph = ConfigFileBuilder::new()
        .with_node("img", NodeConfigBuilder::image("./img", "acme/img"))
        .with_node("cacheimg", NodeConfigBuilder::image("./cache", "acme/cache"))
        .with_node("cache", NodeConfigBuilder::service("cacheimg"))
        .with_node("api", NodeConfigBuilder::service("img").link("cache"))
        .with_node("web", NodeConfigBuilder::service("img").link("cache").link("api"))
        .build_graph();
    let engine = engine_with_images(&["acme/img", "acme/cache"]);
    engine.run_as("acme/cache", "cache_1", "cache_c");
    let orch = orchestrator(graph, &engine);

    orch.ensure_running("web", false).await?;

    let runs = runs(&engine);
    let cache_runs = runs.iter().filter(|(_, args)| args == &strings(&["acme/cache"])).count();
    assert_eq!(cache_runs, 1);
    assert_eq!(runs.len(), 3);
    // api reuses the cache container started for web.
    assert_eq!(runs[1].1, strings(&["--link", "cache_c:cache", "acme/img"]));
    Ok(())
}

#[tokio::test]
async fn stale_images_are_built_before_running() -> TestResult {
    let engine = FakeEngine::new();
    engine.run_as("mydb", "db_1", "mydb_c1");
    let orch = orchestrator(worker_and_db().build_graph(), &engine);

    orch.ensure_running("worker", false).await?;

    let calls = engine.calls();
    let last_build = calls.iter().rposition(EngineCall::is_build).expect("images were built");
    let first_run = calls
        .iter()
        .position(|c| matches!(c, EngineCall::RunContainer { .. }))
        .expect("services were started");
    assert!(last_build < first_run);
    assert!(engine.has_image("mydb"));
    assert!(engine.has_image("workerimage"));
    Ok(())
}

#[tokio::test]
async fn running_an_image_node_is_rejected_before_engine_calls() -> TestResult {
    let engine = FakeEngine::new();
    let orch = orchestrator(worker_and_db().build_graph(), &engine);

    let err = orch.ensure_running("dbimage", false).await.unwrap_err();

    assert!(matches!(err, LayerdagError::Run { ref node, .. } if node == "dbimage"));
    assert!(engine.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_link_start_aborts_the_run() -> TestResult {
    let engine = engine_with_images(&["mydb", "workerimage"]);
    engine.fail_on("run_container", "mydb");
    let orch = orchestrator(worker_and_db().build_graph(), &engine);

    let err = orch.ensure_running("worker", false).await.unwrap_err();

    assert_eq!(err.node(), Some("db"));
    assert_eq!(runs(&engine).len(), 1);
    Ok(())
}
