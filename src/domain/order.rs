//! Bundle ordering
//!
//! Produces a total, deterministic load order where dependencies precede
//! dependents. Eligible artifacts are emitted in input order (Kahn-style);
//! when the remainder is stuck on a cycle, the artifact with the smallest
//! `(url, version)` among those sitting on a cycle is emitted to make
//! progress. Once a cycle is broken, the rest of its strongly connected
//! component is drained before other eligible artifacts, so the result does
//! not depend on where unrelated artifacts sit in the input. References
//! leaving the batch are ignored.

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

use super::artifact::Artifact;
use super::canonical::CanonicalKey;
use super::cycle::has_circular_dependency;

/// Result of ordering a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOrder {
    /// Input indices in load order
    pub indices: Vec<usize>,

    /// Input indices emitted to break a cycle, in the order they were emitted
    pub broken: Vec<usize>,
}

impl LoadOrder {
    pub fn cycles_broken(&self) -> usize {
        self.broken.len()
    }

    /// Applies the order to the slice it was computed from
    pub fn apply<'a, T>(&self, items: &[&'a T]) -> Vec<&'a T> {
        self.indices.iter().map(|i| items[*i]).collect()
    }
}

/// A reference edge between two batch artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEdge {
    /// Index of the referencing artifact
    pub from: usize,
    /// Index of the referenced artifact
    pub to: usize,
    /// The raw reference
    pub raw: String,
}

/// Orders a batch of artifacts for loading
pub struct BundleOrderer;

impl BundleOrderer {
    /// Computes the load order of `artifacts`
    pub fn order(artifacts: &[&Artifact]) -> LoadOrder {
        let (graph, nodes) = Self::build_graph(artifacts);
        if is_cyclic_directed(&graph) {
            debug!(artifacts = artifacts.len(), "Batch contains reference cycles");
        }

        let component = components(&graph);
        let mut emitted = vec![false; artifacts.len()];
        let mut active: Option<usize> = None;
        let mut order = LoadOrder::default();

        while order.indices.len() < artifacts.len() {
            let is_eligible = |i: usize| {
                !emitted[i]
                    && graph
                        .neighbors_directed(nodes[i], Direction::Incoming)
                        .all(|dep| emitted[graph[dep]])
            };

            let eligible = active
                .and_then(|c| (0..artifacts.len()).find(|&i| component[i] == c && is_eligible(i)))
                .or_else(|| (0..artifacts.len()).find(|&i| is_eligible(i)));

            let next = match eligible {
                Some(i) => i,
                None => {
                    let i = Self::break_cycle(artifacts, &graph, &nodes, &emitted);
                    warn!(artifact = %artifacts[i].label(), "Breaking reference cycle");
                    order.broken.push(i);
                    active = Some(component[i]);
                    i
                }
            };

            emitted[next] = true;
            order.indices.push(next);
        }

        order
    }

    /// Convenience form returning the artifacts themselves
    pub fn order_artifacts<'a>(artifacts: &[&'a Artifact]) -> Vec<&'a Artifact> {
        Self::order(artifacts).apply(artifacts)
    }

    /// Every batch edge for which the reference closes a cycle
    pub fn cyclic_edges(artifacts: &[&Artifact]) -> Vec<BatchEdge> {
        let refs = reference_map(artifacts, |_| true);
        let none = HashSet::new();

        batch_edges(artifacts)
            .into_iter()
            .filter(|edge| match artifacts[edge.from].canonical_url() {
                Some(origin) => has_circular_dependency(origin, &edge.raw, &refs, &none),
                None => false,
            })
            .collect()
    }

    /// Directed graph with an edge from each dependency to its dependent
    fn build_graph(artifacts: &[&Artifact]) -> (DiGraph<usize, ()>, Vec<NodeIndex>) {
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..artifacts.len()).map(|i| graph.add_node(i)).collect();

        for edge in batch_edges(artifacts) {
            graph.update_edge(nodes[edge.to], nodes[edge.from], ());
        }

        (graph, nodes)
    }

    /// Picks the artifact to emit when no artifact is eligible
    fn break_cycle(
        artifacts: &[&Artifact],
        graph: &DiGraph<usize, ()>,
        nodes: &[NodeIndex],
        emitted: &[bool],
    ) -> usize {
        let remaining_refs = reference_map(artifacts, |i| !emitted[i]);
        let ignore: HashSet<String> = (0..artifacts.len())
            .filter(|&i| emitted[i])
            .filter_map(|i| artifacts[i].canonical_url())
            .map(str::to_string)
            .collect();

        let on_cycle = |i: usize| -> bool {
            let Some(origin) = artifacts[i].canonical_url() else {
                return false;
            };
            graph
                .neighbors_directed(nodes[i], Direction::Incoming)
                .map(|dep| graph[dep])
                .filter(|&j| !emitted[j])
                .filter_map(|j| artifacts[j].canonical_url())
                .any(|target| has_circular_dependency(origin, target, &remaining_refs, &ignore))
        };

        let rank = |i: &usize| (artifacts[*i].key(), *i);

        (0..artifacts.len())
            .filter(|&i| !emitted[i] && on_cycle(i))
            .min_by_key(rank)
            .or_else(|| (0..artifacts.len()).filter(|&i| !emitted[i]).min_by_key(rank))
            .unwrap_or_default()
    }
}

/// Strongly connected component of each input index
fn components(graph: &DiGraph<usize, ()>) -> Vec<usize> {
    let mut component = vec![0; graph.node_count()];
    for (c, scc) in tarjan_scc(graph).into_iter().enumerate() {
        for node in scc {
            component[graph[node]] = c;
        }
    }
    component
}

/// Reference edges between batch artifacts, self references excluded
fn batch_edges(artifacts: &[&Artifact]) -> Vec<BatchEdge> {
    let mut edges = Vec::new();

    for (from, artifact) in artifacts.iter().enumerate() {
        for raw in &artifact.outgoing_refs {
            let key = CanonicalKey::parse(raw);
            for (to, target) in artifacts.iter().enumerate() {
                if to != from && target.satisfies(&key) {
                    edges.push(BatchEdge {
                        from,
                        to,
                        raw: raw.clone(),
                    });
                }
            }
        }
    }

    edges
}

/// URL -> outgoing references of the selected artifacts
fn reference_map(
    artifacts: &[&Artifact],
    include: impl Fn(usize) -> bool,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut refs: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (i, artifact) in artifacts.iter().enumerate() {
        if !include(i) {
            continue;
        }
        if let Some(url) = artifact.canonical_url() {
            refs.entry(url.to_string())
                .or_default()
                .extend(artifact.outgoing_refs.iter().cloned());
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::ArtifactContent;

    fn profile(url: &str, refs: &[&str]) -> Artifact {
        let mut artifact = Artifact::new(
            "StructureDefinition",
            url.rsplit('/').next().unwrap_or(url),
            ArtifactContent::Profile(Default::default()),
        )
        .with_url(url);
        artifact.outgoing_refs = refs.iter().map(|r| r.to_string()).collect();
        artifact
    }

    fn ids(artifacts: &[&Artifact]) -> Vec<String> {
        BundleOrderer::order_artifacts(artifacts)
            .into_iter()
            .map(|a| a.id.clone())
            .collect()
    }

    #[test]
    fn empty_batch() {
        assert!(BundleOrderer::order(&[]).indices.is_empty());
    }

    #[test]
    fn dependencies_first() {
        let a = profile("http://a.org/A", &["http://a.org/B"]);
        let b = profile("http://a.org/B", &["http://a.org/C"]);
        let c = profile("http://a.org/C", &[]);

        assert_eq!(ids(&[&a, &b, &c]), vec!["C", "B", "A"]);
    }

    #[test]
    fn stable_for_independent_artifacts() {
        let x = profile("http://a.org/X", &[]);
        let y = profile("http://a.org/Y", &[]);
        let z = profile("http://a.org/Z", &[]);

        assert_eq!(ids(&[&z, &x, &y]), vec!["Z", "X", "Y"]);
    }

    #[test]
    fn external_references_ignored() {
        let a = profile("http://a.org/A", &["http://elsewhere.org/Q"]);
        let b = profile("http://a.org/B", &[]);

        let order = BundleOrderer::order(&[&a, &b]);
        assert_eq!(order.indices, vec![0, 1]);
        assert_eq!(order.cycles_broken(), 0);
    }

    #[test]
    fn self_reference_does_not_block() {
        let a = profile("http://a.org/A", &["http://a.org/A"]);
        assert_eq!(BundleOrderer::order(&[&a]).indices, vec![0]);
    }

    #[test]
    fn two_cycle_broken_at_smallest_url() {
        let b = profile("http://a.org/B", &["http://a.org/A"]);
        let a = profile("http://a.org/A", &["http://a.org/B"]);

        let order = BundleOrderer::order(&[&b, &a]);
        assert_eq!(order.indices, vec![1, 0]);
        assert_eq!(order.broken, vec![1]);
    }

    #[test]
    fn dependent_of_cycle_is_not_chosen_to_break_it() {
        // "A" sorts first but only depends on the cycle
        let a = profile("http://a.org/A", &["http://a.org/X"]);
        let x = profile("http://a.org/X", &["http://a.org/Y"]);
        let y = profile("http://a.org/Y", &["http://a.org/X"]);

        assert_eq!(ids(&[&a, &x, &y]), vec!["X", "Y", "A"]);
    }

    #[test]
    fn broken_cycle_is_drained_before_unrelated_artifacts() {
        // "D" becomes eligible with "X" but sits ahead of "Y" in the input
        let d = profile("http://a.org/D", &["http://a.org/X"]);
        let x = profile("http://a.org/X", &["http://a.org/Y"]);
        let y = profile("http://a.org/Y", &["http://a.org/X"]);

        assert_eq!(ids(&[&d, &x, &y]), vec!["X", "Y", "D"]);
        assert_eq!(ids(&[&y, &x, &d]), vec!["X", "Y", "D"]);
    }

    #[test]
    fn versioned_reference_to_other_version_is_external() {
        let a = profile("http://a.org/A", &["http://a.org/B|2.0"]);
        let b = profile("http://a.org/B", &[]).with_version("1.0");

        assert_eq!(BundleOrderer::order(&[&a, &b]).indices, vec![0, 1]);
    }

    #[test]
    fn cyclic_edges_reported() {
        let a = profile("http://a.org/A", &["http://a.org/B"]);
        let b = profile("http://a.org/B", &["http://a.org/A"]);
        let c = profile("http://a.org/C", &["http://a.org/A"]);

        let edges = BundleOrderer::cyclic_edges(&[&a, &b, &c]);
        let pairs: Vec<(usize, usize)> = edges.iter().map(|e| (e.from, e.to)).collect();
        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
    }
}
