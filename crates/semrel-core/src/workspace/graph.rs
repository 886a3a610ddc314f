//! Dependency graph between workspace members

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CycleError;
use crate::manifest::DependencyKind;

/// A dependency of one member on another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Dependent member
    pub from: String,
    /// Member depended on
    pub to: String,
    /// Sections the dependency is declared in
    pub kinds: BTreeSet<DependencyKind>,
}

impl Edge {
    /// Only declared as a dev-dependency
    pub fn is_dev_only(&self) -> bool {
        self.kinds.iter().all(|k| *k == DependencyKind::Dev)
    }
}

/// Members and the edges between them
///
/// Publish ordering and cycle detection ignore dev-only edges: Cargo strips
/// dev-dependencies from published packages and allows them to form cycles.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    edges: BTreeMap<(String, String), BTreeSet<DependencyKind>>,
}

impl DependencyGraph {
    /// Create a graph with the given members and no edges
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: members.into_iter().map(Into::into).collect(),
            edges: BTreeMap::new(),
        }
    }

    /// Record that `from` depends on `to`
    pub fn add_edge(&mut self, from: &str, to: &str, kind: DependencyKind) {
        self.nodes.insert(from.to_string());
        self.nodes.insert(to.to_string());
        self.edges
            .entry((from.to_string(), to.to_string()))
            .or_default()
            .insert(kind);
    }

    /// Member names, sorted
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    /// All edges, sorted by (from, to)
    pub fn edges(&self) -> Vec<Edge> {
        self.edges
            .iter()
            .map(|((from, to), kinds)| Edge {
                from: from.clone(),
                to: to.clone(),
                kinds: kinds.clone(),
            })
            .collect()
    }

    /// Direct dependencies of a member, any kind
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.edges
            .keys()
            .filter(|(from, _)| from == name)
            .map(|(_, to)| to.as_str())
            .collect()
    }

    /// Direct dependents of a member, any kind
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.edges
            .keys()
            .filter(|(_, to)| to == name)
            .map(|(from, _)| from.as_str())
            .collect()
    }

    fn ordering_edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges
            .iter()
            .filter(|(_, kinds)| kinds.iter().any(DependencyKind::is_published))
            .map(|((from, to), _)| (from.as_str(), to.as_str()))
    }

    /// Normal and build dependencies of a member, transitively
    pub fn transitive_dependencies(&self, name: &str) -> BTreeSet<String> {
        let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (from, to) in self.ordering_edges() {
            adjacency.entry(from).or_default().push(to);
        }

        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([name]);
        while let Some(current) = queue.pop_front() {
            for dep in adjacency.get(current).into_iter().flatten() {
                if seen.insert(dep.to_string()) {
                    queue.push_back(*dep);
                }
            }
        }
        seen
    }

    /// Dependencies-first order, ties broken by name (Kahn's algorithm)
    pub fn publish_order(&self) -> Result<Vec<String>, CycleError> {
        let mut in_degree: BTreeMap<&str, usize> =
            self.nodes.iter().map(|n| (n.as_str(), 0)).collect();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (from, to) in self.ordering_edges() {
            *in_degree.entry(from).or_default() += 1;
            dependents.entry(to).or_default().push(from);
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(name) = ready.pop_first() {
            order.push(name.to_string());
            for dependent in dependents.get(name).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let members = self.cycle_members();
            debug!(members = ?members, "dependency cycle detected");
            return Err(CycleError { members });
        }

        Ok(order)
    }

    /// Members lying on at least one cycle of normal/build edges, sorted
    ///
    /// Members that only depend on a cycle are not included.
    pub fn cycle_members(&self) -> Vec<String> {
        let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (from, to) in self.ordering_edges() {
            adjacency.entry(from).or_default().push(to);
        }

        self.nodes
            .iter()
            .filter(|start| {
                let mut seen = BTreeSet::new();
                let mut stack: Vec<&str> = adjacency.get(start.as_str()).cloned().unwrap_or_default();
                while let Some(current) = stack.pop() {
                    if current == start.as_str() {
                        return true;
                    }
                    if seen.insert(current) {
                        stack.extend(adjacency.get(current).into_iter().flatten());
                    }
                }
                false
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for (from, to) in edges {
            graph.add_edge(from, to, DependencyKind::Normal);
        }
        graph
    }

    #[test]
    fn test_chain_order() {
        let graph = graph(&[("a", "b"), ("b", "c")]);
        assert_eq!(graph.publish_order().unwrap(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_ties_break_by_name() {
        let mut graph = graph(&[("app", "zeta"), ("app", "alpha")]);
        graph.nodes.insert("lonely".to_string());
        assert_eq!(
            graph.publish_order().unwrap(),
            vec!["alpha", "lonely", "zeta", "app"]
        );
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let graph = graph(&[
            ("cli", "core"),
            ("cli", "util"),
            ("util", "core"),
            ("server", "util"),
            ("server", "proto"),
            ("proto", "core"),
        ]);
        let order = graph.publish_order().unwrap();
        let position = |n: &str| order.iter().position(|o| o == n).unwrap();
        for edge in graph.edges() {
            assert!(position(&edge.to) < position(&edge.from), "{edge:?}");
        }
    }

    #[test]
    fn test_cycle_lists_only_cycle_members() {
        // d depends on the a -> b -> c -> a cycle without being part of it
        let graph = graph(&[("a", "b"), ("b", "c"), ("c", "a"), ("d", "a"), ("e", "e")]);
        let err = graph.publish_order().unwrap_err();
        assert_eq!(err.members, vec!["a", "b", "c", "e"]);
    }

    #[test]
    fn test_dev_edges_ignored_for_ordering() {
        let mut graph = graph(&[("a", "b")]);
        graph.add_edge("b", "a", DependencyKind::Dev);
        assert_eq!(graph.publish_order().unwrap(), vec!["b", "a"]);
        assert!(graph.cycle_members().is_empty());

        let edges = graph.edges();
        assert!(edges.iter().any(|e| e.from == "b" && e.is_dev_only()));
        assert_eq!(graph.dependencies_of("b"), vec!["a"]);
        assert_eq!(graph.dependents_of("a"), vec!["b"]);
    }

    #[test]
    fn test_mixed_kinds_keep_edge() {
        let mut graph = graph(&[]);
        graph.add_edge("a", "b", DependencyKind::Dev);
        graph.add_edge("a", "b", DependencyKind::Build);
        let edge = &graph.edges()[0];
        assert!(!edge.is_dev_only());
        assert_eq!(graph.publish_order().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_transitive_dependencies() {
        let mut graph = graph(&[("a", "b"), ("b", "c")]);
        graph.add_edge("c", "d", DependencyKind::Dev);
        let deps = graph.transitive_dependencies("a");
        assert_eq!(
            deps.into_iter().collect::<Vec<_>>(),
            vec!["b".to_string(), "c".to_string()]
        );
    }
}
