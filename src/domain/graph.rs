//! Dependency graph for conformance artifacts
//!
//! An arena of artifacts addressed by [`ArtifactId`], indexed by unversioned
//! canonical URL, plus the table of every raw reference seen so far and its
//! resolution state. Built incrementally by scanning and resolution; entries
//! are never removed, references only move out of `Pending`.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use super::artifact::{Artifact, ArtifactId, ArtifactKind};
use super::canonical::{strip_version, CanonicalKey};
use super::cycle::ReferenceGraph;
use super::package::PackageKey;
use super::scanner::CanonicalRef;
use super::version::VersionSelector;

/// How an artifact entered the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "from")]
pub enum ArtifactOrigin {
    /// Part of the batch being loaded
    Batch,
    /// Resolved from a dependency package
    Package { package: PackageKey },
    /// Returned by the external lookup
    External,
}

impl ArtifactOrigin {
    pub fn is_batch(&self) -> bool {
        matches!(self, ArtifactOrigin::Batch)
    }
}

/// Resolution state of one raw reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceState {
    Pending,
    Resolved(ArtifactId),
    Unresolvable,
}

/// A raw reference and everything known about it
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceEntry {
    pub key: CanonicalKey,
    pub kind: ArtifactKind,
    pub required_by: Vec<ArtifactId>,
    pub state: ReferenceState,
}

impl ReferenceEntry {
    pub fn is_pending(&self) -> bool {
        self.state == ReferenceState::Pending
    }
}

/// A dependency graph over conformance artifacts
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Arena of artifacts
    artifacts: Vec<Artifact>,

    /// Origin of each artifact, parallel to `artifacts`
    origins: Vec<ArtifactOrigin>,

    /// Unversioned canonical URL -> artifacts declaring it
    by_url: BTreeMap<String, Vec<ArtifactId>>,

    /// Raw reference -> resolution entry
    references: BTreeMap<String, ReferenceEntry>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artifact and returns its id
    ///
    /// Any pending reference the artifact satisfies is resolved to it.
    pub fn insert(&mut self, artifact: Artifact, origin: ArtifactOrigin) -> ArtifactId {
        let id = ArtifactId(self.artifacts.len());

        if let Some(url) = artifact.canonical_url() {
            self.by_url.entry(url.to_string()).or_default().push(id);
        }

        let satisfied: Vec<String> = match artifact.canonical_url() {
            Some(url) => self
                .raw_references_for(url)
                .filter(|raw| {
                    let entry = &self.references[*raw];
                    entry.is_pending() && artifact.satisfies(&entry.key)
                })
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        self.artifacts.push(artifact);
        self.origins.push(origin);

        for raw in satisfied {
            self.mark_resolved(&raw, id);
        }

        id
    }

    /// Records the references scanned from `from`
    ///
    /// Sets the artifact's `outgoing_refs`. A reference already satisfied by
    /// a known artifact is resolved immediately; otherwise it becomes pending.
    /// Returns the number of references that became pending.
    pub fn record_references(&mut self, from: ArtifactId, refs: BTreeSet<CanonicalRef>) -> usize {
        let mut newly_pending = 0;

        for reference in refs {
            self.artifacts[from.0].outgoing_refs.insert(reference.raw.clone());

            if !self.references.contains_key(&reference.raw) {
                let key = CanonicalKey::parse(&reference.raw);
                let state = match self.find_known(&key) {
                    Some(target) => ReferenceState::Resolved(target),
                    None => {
                        newly_pending += 1;
                        ReferenceState::Pending
                    }
                };
                self.references.insert(
                    reference.raw.clone(),
                    ReferenceEntry {
                        key,
                        kind: reference.kind,
                        required_by: Vec::new(),
                        state,
                    },
                );
            }

            let Some(entry) = self.references.get_mut(&reference.raw) else {
                continue;
            };
            if !entry.required_by.contains(&from) {
                entry.required_by.push(from);
            }
            if let ReferenceState::Resolved(target) = entry.state {
                link(&mut self.artifacts[target.0], from);
            }
        }

        newly_pending
    }

    /// Returns the best known artifact satisfying `key`
    ///
    /// Batch artifacts take priority; ties go through [`VersionSelector`].
    pub fn find_known(&self, key: &CanonicalKey) -> Option<ArtifactId> {
        let matches: Vec<ArtifactId> = self
            .by_url
            .get(&key.url)
            .into_iter()
            .flatten()
            .copied()
            .filter(|id| self.artifacts[id.0].satisfies(key))
            .collect();

        let batch: Vec<ArtifactId> = matches
            .iter()
            .copied()
            .filter(|id| self.origins[id.0].is_batch())
            .collect();
        let pool = if batch.is_empty() { matches } else { batch };

        self.select(&pool)
    }

    /// Applies [`VersionSelector`] to a set of ids
    pub fn select(&self, ids: &[ArtifactId]) -> Option<ArtifactId> {
        let candidates: Vec<&Artifact> = ids.iter().map(|id| &self.artifacts[id.0]).collect();
        let chosen = VersionSelector::current(&candidates)?;
        ids.iter()
            .copied()
            .find(|id| std::ptr::eq(&self.artifacts[id.0], chosen))
    }

    /// Returns the first pending reference in canonical order
    pub fn next_pending(&self) -> Option<(&str, &ReferenceEntry)> {
        self.references
            .iter()
            .find(|(_, entry)| entry.is_pending())
            .map(|(raw, entry)| (raw.as_str(), entry))
    }

    /// Marks a reference as resolved to `target` and links the back-references
    pub fn mark_resolved(&mut self, raw: &str, target: ArtifactId) {
        let Some(entry) = self.references.get_mut(raw) else {
            return;
        };
        entry.state = ReferenceState::Resolved(target);
        for requirer in entry.required_by.clone() {
            link(&mut self.artifacts[target.0], requirer);
        }
    }

    /// Marks a reference as unresolvable
    pub fn mark_unresolvable(&mut self, raw: &str) {
        if let Some(entry) = self.references.get_mut(raw) {
            entry.state = ReferenceState::Unresolvable;
        }
    }

    /// Raw references (keys of the reference table) for an unversioned URL
    fn raw_references_for<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.references
            .range::<str, _>((Bound::Included(url), Bound::Unbounded))
            .map(|(raw, _)| raw.as_str())
            .take_while(move |raw| raw.starts_with(url))
            .filter(move |raw| strip_version(raw) == url)
    }

    pub fn artifact(&self, id: ArtifactId) -> &Artifact {
        &self.artifacts[id.0]
    }

    pub fn origin(&self, id: ArtifactId) -> &ArtifactOrigin {
        &self.origins[id.0]
    }

    /// All artifact ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = ArtifactId> {
        (0..self.artifacts.len()).map(ArtifactId)
    }

    /// Ids of batch artifacts in insertion order
    pub fn batch_ids(&self) -> impl Iterator<Item = ArtifactId> + '_ {
        self.ids().filter(move |id| self.origins[id.0].is_batch())
    }

    /// Artifacts declaring the given unversioned URL
    pub fn candidates(&self, url: &str) -> &[ArtifactId] {
        self.by_url.get(url).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every reference seen, in canonical order
    pub fn references(&self) -> impl Iterator<Item = (&str, &ReferenceEntry)> {
        self.references.iter().map(|(raw, entry)| (raw.as_str(), entry))
    }

    pub fn reference(&self, raw: &str) -> Option<&ReferenceEntry> {
        self.references.get(raw)
    }

    /// Returns true if any artifact still has this URL pending
    pub fn is_pending(&self, url: &str) -> bool {
        self.raw_references_for(url)
            .any(|raw| self.references[raw].is_pending())
    }

    pub fn pending_count(&self) -> usize {
        self.references.values().filter(|e| e.is_pending()).count()
    }

    /// Returns the number of artifacts in the graph
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ReferenceGraph for DependencyGraph {
    fn references(&self, url: &str) -> Vec<&str> {
        self.candidates(url)
            .iter()
            .flat_map(|id| self.artifacts[id.0].outgoing_refs.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Appends a back-link unless already present
fn link(target: &mut Artifact, requirer: ArtifactId) {
    if !target.required_by.contains(&requirer) {
        target.required_by.push(requirer);
    }
}
