//! Package dependency tree
//!
//! Packages are held in an arena keyed by `(package id, package version)`;
//! dependency edges are keys, so manifests that declare cyclic dependencies
//! still form a finite structure. Walks treat visited keys as terminal.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use super::artifact::Artifact;
use super::core::is_core_package;

/// Identity of a package: `(id, version)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageKey {
    pub id: String,
    pub version: String,
}

impl PackageKey {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.version)
    }
}

/// One package: its artifacts and declared dependencies
#[derive(Debug, Clone)]
pub struct PackageNode {
    pub key: PackageKey,
    pub artifacts: Vec<Artifact>,
    pub dependencies: Vec<PackageKey>,
}

impl PackageNode {
    pub fn new(key: PackageKey) -> Self {
        Self {
            key,
            artifacts: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: Vec<Artifact>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_dependency(mut self, key: PackageKey) -> Self {
        self.dependencies.push(key);
        self
    }
}

/// A materialized package dependency tree
#[derive(Debug, Clone, Default)]
pub struct PackageTree {
    roots: Vec<PackageKey>,
    nodes: HashMap<PackageKey, PackageNode>,
    missing: BTreeSet<PackageKey>,
}

impl PackageTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node; the first node added per key wins
    pub fn insert(&mut self, node: PackageNode) {
        self.nodes.entry(node.key.clone()).or_insert(node);
    }

    /// Adds a node and marks it as a walk root
    pub fn insert_root(&mut self, node: PackageNode) {
        if !self.roots.contains(&node.key) {
            self.roots.push(node.key.clone());
        }
        self.insert(node);
    }

    /// Records a declared dependency that could not be loaded
    pub fn mark_missing(&mut self, key: PackageKey) {
        self.missing.insert(key);
    }

    pub fn roots(&self) -> &[PackageKey] {
        &self.roots
    }

    pub fn get(&self, key: &PackageKey) -> Option<&PackageNode> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &PackageKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Declared dependencies that were never loaded
    pub fn missing(&self) -> impl Iterator<Item = &PackageKey> {
        self.missing.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first walk from the roots, visiting each key at most once
    ///
    /// Children are visited in declaration order. Keys without a loaded node
    /// are skipped.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a PackageNode)) {
        let mut visited: HashSet<&PackageKey> = HashSet::new();
        let mut stack: Vec<&PackageKey> = self.roots.iter().rev().collect();

        while let Some(key) = stack.pop() {
            if !visited.insert(key) {
                continue;
            }
            let Some(node) = self.nodes.get(key) else {
                continue;
            };

            visit(node);

            for dep in node.dependencies.iter().rev() {
                if !visited.contains(dep) {
                    stack.push(dep);
                }
            }
        }
    }

    /// Canonical URLs shipped by base specification packages in the tree
    pub fn core_canonicals(&self) -> BTreeSet<String> {
        let mut canonicals = BTreeSet::new();
        self.walk(|node| {
            if is_core_package(&node.key.id) {
                canonicals.extend(
                    node.artifacts
                        .iter()
                        .filter_map(|a| a.canonical_url())
                        .map(str::to_string),
                );
            }
        });
        canonicals
    }
}
