// tests/property_dag.rs

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;

use layerdag::config::ConfigFile;
use layerdag::dag::Graph;
use layerdag_test_utils::builders::{ConfigFileBuilder, NodeConfigBuilder};
use layerdag_test_utils::{orchestrator, EngineCall, FakeEngine};

/// Random acyclic graphs of image nodes: node N may only depend on 0..N-1.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = (ConfigFile, Vec<BTreeSet<usize>>)> {
    (1..=max_nodes).prop_flat_map(|num_nodes| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_nodes),
            num_nodes,
        )
        .prop_map(move |raw_deps| {
            let mut builder = ConfigFileBuilder::new();
            let mut deps = Vec::with_capacity(raw_deps.len());
            for (i, potential) in raw_deps.into_iter().enumerate() {
                let valid: BTreeSet<usize> = if i == 0 {
                    BTreeSet::new()
                } else {
                    potential.into_iter().map(|d| d % i).collect()
                };

                let mut node = NodeConfigBuilder::image(&format!("ctx/n{i}"), &format!("acme/n{i}"));
                for d in &valid {
                    node = node.after(&format!("n{d}"));
                }
                builder = builder.with_node(&format!("n{i}"), node);
                deps.push(valid);
            }
            (builder.build(), deps)
        })
    })
}

fn built_node(call: &EngineCall) -> Option<usize> {
    match call {
        EngineCall::BuildImage { tag, .. } => tag.strip_prefix("acme/n")?.parse().ok(),
        _ => None,
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn every_node_in_closure_builds_once_after_its_deps(
        (cfg, deps) in dag_strategy(8),
    ) {
        let graph = Graph::from_config(&cfg).unwrap();
        let target = deps.len() - 1;
        let engine = FakeEngine::new();
        let orch = orchestrator(graph, &engine);

        runtime().block_on(orch.ensure_built(&format!("n{target}"))).unwrap();

        let order: Vec<usize> = engine.calls().iter().filter_map(built_node).collect();
        let position: HashMap<usize, usize> =
            order.iter().enumerate().map(|(pos, n)| (*n, pos)).collect();

        // No duplicates.
        prop_assert_eq!(position.len(), order.len());
        prop_assert!(position.contains_key(&target));

        for (&node, &pos) in &position {
            for dep in &deps[node] {
                let dep_pos = position.get(dep);
                prop_assert!(dep_pos.is_some(), "n{} built without dependency n{}", node, dep);
                prop_assert!(dep_pos.copied() < Some(pos));
            }
        }
    }

    #[test]
    fn rebuilding_is_idempotent((cfg, deps) in dag_strategy(8)) {
        let graph = Graph::from_config(&cfg).unwrap();
        let target = format!("n{}", deps.len() - 1);
        let engine = FakeEngine::new();
        let orch = orchestrator(graph, &engine);
        let rt = runtime();

        let first = rt.block_on(orch.ensure_built(&target)).unwrap();
        engine.clear_calls();
        let second = rt.block_on(orch.ensure_built(&target)).unwrap();

        prop_assert_eq!(first, second);
        prop_assert!(!engine.calls().iter().any(EngineCall::is_mutation));
    }
}
