pub mod builders;
pub mod fake_engine;

use std::sync::{Arc, Once};

use layerdag::dag::Graph;
use layerdag::engine::Orchestrator;
use tracing::{dispatcher, Dispatch};
use tracing_subscriber::{fmt, EnvFilter};

pub use fake_engine::{EngineCall, FakeEngine};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Orchestrator over `graph` backed by `engine`, logging to the test
/// subscriber.
pub fn orchestrator(graph: Graph, engine: &FakeEngine) -> Orchestrator {
    init_tracing();
    let diagnostics = dispatcher::get_default(Dispatch::clone);
    Orchestrator::new(graph, Arc::new(engine.clone()), diagnostics)
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}
