//! Circular dependency detection
//!
//! Answers "would the edge `origin -> target` close a cycle?" by searching
//! the reference graph from `target` for a path back to `origin`. The search
//! is iterative with its own visited set, so it terminates on graphs that
//! are already cyclic elsewhere.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::artifact::Artifact;
use super::canonical::strip_version;

/// Read-only view of outgoing references keyed by unversioned canonical URL
pub trait ReferenceGraph {
    /// Raw references made by the artifact(s) with this URL
    fn references(&self, url: &str) -> Vec<&str>;
}

impl ReferenceGraph for BTreeMap<String, BTreeSet<String>> {
    fn references(&self, url: &str) -> Vec<&str> {
        self.get(url)
            .map(|refs| refs.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

impl<'a> ReferenceGraph for BTreeMap<&'a str, &'a Artifact> {
    fn references(&self, url: &str) -> Vec<&str> {
        self.get(url)
            .map(|a| a.outgoing_refs.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Returns true if adding `origin -> target_url` would close a cycle
///
/// Follows outgoing references from the artifact identified by `target_url`
/// and reports whether `origin_url` is reachable. URLs in `ignore` are never
/// entered. A reference from an artifact to itself counts as circular.
/// Version suffixes are ignored throughout.
pub fn has_circular_dependency(
    origin_url: &str,
    target_url: &str,
    graph: &impl ReferenceGraph,
    ignore: &HashSet<String>,
) -> bool {
    let origin = strip_version(origin_url);
    let target = strip_version(target_url);

    if origin == target {
        return true;
    }
    if ignore.contains(target) {
        return false;
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack = vec![target];

    while let Some(url) = stack.pop() {
        if !visited.insert(url) {
            continue;
        }

        for raw in graph.references(url) {
            let next = strip_version(raw);
            if next == origin {
                return true;
            }
            if !visited.contains(next) && !ignore.contains(next) {
                stack.push(next);
            }
        }
    }

    false
}

/// Convenience form taking the origin artifact
pub fn artifact_has_circular_dependency(
    origin: &Artifact,
    target_url: &str,
    graph: &impl ReferenceGraph,
    ignore: &HashSet<String>,
) -> bool {
    match origin.canonical_url() {
        Some(url) => has_circular_dependency(url, target_url, graph, ignore),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
        edges
            .iter()
            .map(|(from, to)| {
                (
                    from.to_string(),
                    to.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn two_node_cycle_is_symmetric() {
        let g = graph(&[("A", &["B"]), ("B", &["A"])]);
        let none = HashSet::new();

        assert!(has_circular_dependency("A", "B", &g, &none));
        assert!(has_circular_dependency("B", "A", &g, &none));
    }

    #[test]
    fn outsider_not_contaminated() {
        let g = graph(&[("A", &["B"]), ("B", &["A"]), ("C", &["B"])]);
        let none = HashSet::new();

        assert!(!has_circular_dependency("C", "B", &g, &none));
    }

    #[test]
    fn acyclic_chain() {
        let g = graph(&[("A", &["B"]), ("B", &["C"])]);
        let none = HashSet::new();

        assert!(!has_circular_dependency("A", "B", &g, &none));
        assert!(has_circular_dependency("C", "A", &g, &none));
    }

    #[test]
    fn self_reference_is_circular() {
        let g = graph(&[]);
        assert!(has_circular_dependency("A", "A|1.0", &g, &HashSet::new()));
    }

    #[test]
    fn versions_ignored() {
        let g = graph(&[("A", &["B|2"]), ("B", &["A|1"])]);
        assert!(has_circular_dependency("A|1", "B", &g, &HashSet::new()));
    }

    #[test]
    fn ignore_set_cuts_paths() {
        let g = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"])]);
        let mut ignore = HashSet::new();
        ignore.insert("C".to_string());

        assert!(!has_circular_dependency("A", "B", &g, &ignore));
        assert!(!has_circular_dependency("B", "C", &g, &ignore));
    }

    #[test]
    fn unknown_target_is_not_circular() {
        let g = graph(&[("A", &["X"])]);
        assert!(!has_circular_dependency("A", "X", &g, &HashSet::new()));
    }

    #[test]
    fn graph_not_mutated() {
        let g = graph(&[("A", &["B"]), ("B", &["A"])]);
        let before = g.clone();
        has_circular_dependency("A", "B", &g, &HashSet::new());
        assert_eq!(g, before);
    }
}
