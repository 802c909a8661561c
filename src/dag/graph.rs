// src/dag/graph.rs

use std::collections::{BTreeMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::ConfigFile;
use crate::dag::node::Node;
use crate::errors::{LayerdagError, Result};
use crate::runner::Runner;
use crate::types::{NodeKind, NodeName};

/// The complete, validated set of nodes.
///
/// Construction checks everything the traversal relies on:
/// - node names are unique
/// - every dependency names a node of this graph
/// - dependency kinds make sense for the runner that declares them
/// - the dependency relation is acyclic
///
/// After that the graph is immutable.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: BTreeMap<NodeName, Node>,
}

impl Graph {
    pub fn new(nodes: impl IntoIterator<Item = Node>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for node in nodes {
            let name = node.name().to_string();
            if map.insert(name.clone(), node).is_some() {
                return Err(LayerdagError::DuplicateNode(name));
            }
        }

        let graph = Self { nodes: map };
        graph.validate_references()?;
        graph.validate_kinds()?;
        graph.validate_acyclic()?;
        Ok(graph)
    }

    /// Build a graph from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Self::new(
            cfg.nodes()
                .iter()
                .map(|(name, node)| Node::from_config(name, node)),
        )
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve a node by name.
    pub fn get(&self, name: &str) -> Result<&Node> {
        self.nodes
            .get(name)
            .ok_or_else(|| LayerdagError::NodeNotFound(name.to_string()))
    }

    /// All nodes, ordered by name.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// The target and everything it transitively depends on, dependencies
    /// first.
    ///
    /// Dependencies are visited in declaration order, so the result is the
    /// same order in which the orchestrator touches the nodes.
    pub fn closure(&self, target: &str) -> Result<Vec<&Node>> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        self.visit(self.get(target)?, &mut seen, &mut order);
        Ok(order)
    }

    fn visit<'a>(&'a self, node: &'a Node, seen: &mut HashSet<&'a str>, order: &mut Vec<&'a Node>) {
        if !seen.insert(node.name()) {
            return;
        }
        for dep in node.deps() {
            // References were validated at construction.
            if let Some(dep_node) = self.nodes.get(dep) {
                self.visit(dep_node, seen, order);
            }
        }
        order.push(node);
    }

    fn validate_references(&self) -> Result<()> {
        for node in self.nodes.values() {
            for dep in node.deps() {
                if dep == node.name() {
                    return Err(LayerdagError::ConfigError(format!(
                        "node '{}' cannot depend on itself",
                        node.name()
                    )));
                }
                if !self.nodes.contains_key(dep) {
                    return Err(LayerdagError::ConfigError(format!(
                        "node '{}' has unknown dependency '{}'",
                        node.name(),
                        dep
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_kinds(&self) -> Result<()> {
        for node in self.nodes.values() {
            match node.runner() {
                Runner::Image(image) => {
                    for dep in &image.after {
                        self.expect_image_producer(node, dep, "after")?;
                    }
                }
                Runner::Artifact(artifact) => {
                    self.expect_image_producer(node, &artifact.base, "base")?;
                    for dep in &artifact.after {
                        self.expect_image_producer(node, dep, "after")?;
                    }
                }
                Runner::Service(service) => {
                    self.expect_image_producer(node, &service.image, "image")?;
                    for link in &service.links {
                        let kind = self.kind_of(link);
                        if kind != NodeKind::Service {
                            return Err(LayerdagError::ConfigError(format!(
                                "node '{}' links to '{}', which is a {} node, not a service",
                                node.name(),
                                link,
                                kind
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn expect_image_producer(&self, node: &Node, dep: &str, field: &str) -> Result<()> {
        let kind = self.kind_of(dep);
        if !kind.produces_image() {
            return Err(LayerdagError::ConfigError(format!(
                "node '{}' refers to '{}' in `{}`, but '{}' is a {} node and produces no image",
                node.name(),
                dep,
                field,
                dep,
                kind
            )));
        }
        Ok(())
    }

    fn kind_of(&self, name: &str) -> NodeKind {
        self.nodes[name].kind()
    }

    fn validate_acyclic(&self) -> Result<()> {
        // Edge direction: dep -> node.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for name in self.nodes.keys() {
            graph.add_node(name.as_str());
        }

        for node in self.nodes.values() {
            for dep in node.deps() {
                graph.add_edge(dep.as_str(), node.name(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(LayerdagError::DagCycle(format!(
                "cycle detected in node graph involving node '{}'",
                cycle.node_id()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{ArtifactBuilder, ImageBuilder, ServiceRunner};

    fn image(name: &str, after: &[&str]) -> Node {
        let mut builder = ImageBuilder::new(format!("./{name}"), name);
        builder.after = after.iter().map(|s| s.to_string()).collect();
        Node::new(name, builder)
    }

    fn service(name: &str, image: &str, links: &[&str]) -> Node {
        let mut runner = ServiceRunner::new(image, Vec::<String>::new());
        runner.links = links.iter().map(|s| s.to_string()).collect();
        Node::new(name, runner)
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Graph::new([image("a", &[]), image("a", &[])]).unwrap_err();
        assert!(matches!(err, LayerdagError::DuplicateNode(name) if name == "a"));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let err = Graph::new([image("a", &["missing"])]).unwrap_err();
        assert!(matches!(err, LayerdagError::ConfigError(msg) if msg.contains("missing")));
    }

    #[test]
    fn self_dependency_is_rejected() {
        let err = Graph::new([image("a", &["a"])]).unwrap_err();
        assert!(matches!(err, LayerdagError::ConfigError(msg) if msg.contains("itself")));
    }

    #[test]
    fn cycle_is_rejected() {
        let err = Graph::new([image("a", &["b"]), image("b", &["c"]), image("c", &["a"])])
            .unwrap_err();
        assert!(matches!(err, LayerdagError::DagCycle(msg) if msg.contains("cycle detected")));
    }

    #[test]
    fn service_cannot_link_to_an_image() {
        let err = Graph::new([image("base", &[]), service("web", "base", &["base"])]).unwrap_err();
        assert!(matches!(err, LayerdagError::ConfigError(msg) if msg.contains("not a service")));
    }

    #[test]
    fn build_node_cannot_depend_on_a_service() {
        let artifact = ArtifactBuilder::new("db", ".", "acme/app");
        let err = Graph::new([
            image("base", &[]),
            service("db", "base", &[]),
            Node::new("app", artifact),
        ])
        .unwrap_err();
        assert!(matches!(err, LayerdagError::ConfigError(msg) if msg.contains("produces no image")));
    }

    #[test]
    fn closure_is_dependencies_first_in_declaration_order() {
        let graph = Graph::new([
            image("base", &[]),
            service("db", "base", &[]),
            service("cache", "base", &[]),
            service("web", "base", &["db", "cache"]),
        ])
        .unwrap();

        let order: Vec<&str> = graph.closure("web").unwrap().into_iter().map(|n| n.name()).collect();
        assert_eq!(order, vec!["base", "db", "cache", "web"]);
    }

    #[test]
    fn closure_of_unknown_target_fails() {
        let graph = Graph::new([image("base", &[])]).unwrap();
        assert!(matches!(
            graph.closure("nope"),
            Err(LayerdagError::NodeNotFound(name)) if name == "nope"
        ));
    }
}
