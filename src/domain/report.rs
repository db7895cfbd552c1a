//! Run results and the dependency report
//!
//! Every stage returns a [`RunResult`] (counters plus classified issues);
//! the caller merges them. After a run, [`DependencyReport`] classifies the
//! references that left the batch: directly required externals, indirectly
//! required externals, and unresolvable canonicals, each sorted by
//! `(url, version)`.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

use super::artifact::{ArtifactId, ArtifactKind};
use super::canonical::CanonicalKey;
use super::graph::{ArtifactOrigin, DependencyGraph, ReferenceState};

/// Classification of a non-fatal problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnresolvableReference,
    AmbiguousCandidate,
    CyclicReference,
    MalformedArtifact,
}

impl IssueKind {
    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::UnresolvableReference => "unresolvable",
            IssueKind::AmbiguousCandidate => "ambiguous",
            IssueKind::CyclicReference => "cycle",
            IssueKind::MalformedArtifact => "malformed",
        }
    }
}

/// One reported problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub subject: String,
    pub message: String,
}

impl Issue {
    pub fn new(kind: IssueKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.label(), self.subject, self.message)
    }
}

/// Counters and issues produced by a stage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunResult {
    /// Artifacts scanned for references
    pub scanned: usize,
    /// References recorded
    pub references: usize,
    /// References satisfied inside the batch
    pub resolved_in_batch: usize,
    /// References resolved from dependency packages
    pub resolved_from_packages: usize,
    /// References resolved through the external lookup
    pub resolved_externally: usize,
    /// References nothing could satisfy
    pub unresolved: usize,
    /// External lookups that failed or timed out
    pub lookup_failures: usize,
    /// Resolutions that had to pick among differing versions
    pub ambiguous: usize,
    /// Cycles broken while ordering
    pub cycles_broken: usize,
    /// Batch artifacts excluded before scanning
    pub skipped: usize,
    pub issues: Vec<Issue>,
}

impl RunResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds another stage's result into this one
    pub fn merge(&mut self, other: RunResult) {
        self.scanned += other.scanned;
        self.references += other.references;
        self.resolved_in_batch += other.resolved_in_batch;
        self.resolved_from_packages += other.resolved_from_packages;
        self.resolved_externally += other.resolved_externally;
        self.unresolved += other.unresolved;
        self.lookup_failures += other.lookup_failures;
        self.ambiguous += other.ambiguous;
        self.cycles_broken += other.cycles_broken;
        self.skipped += other.skipped;
        self.issues.extend(other.issues);
    }

    pub fn issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Issues of one kind
    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }
}

/// A canonical that left the batch, with who required it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalEntry {
    pub canonical: CanonicalKey,
    pub kind: ArtifactKind,
    /// Where it was found (`package#version`, `external`), absent if unresolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_from: Option<String>,
    /// Direct requirers
    pub required_by: Vec<CanonicalKey>,
    /// Shortest requirer path back to a batch artifact, nearest first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<CanonicalKey>,
}

/// The report sink's three classified lists
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DependencyReport {
    pub direct: Vec<ExternalEntry>,
    pub indirect: Vec<ExternalEntry>,
    pub unresolvable: Vec<ExternalEntry>,
    /// Batch artifacts left out because the base specification ships them
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<CanonicalKey>,
}

impl DependencyReport {
    /// Classifies the references of a resolved graph
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        let mut direct: BTreeMap<CanonicalKey, ExternalEntry> = BTreeMap::new();
        let mut indirect: BTreeMap<CanonicalKey, ExternalEntry> = BTreeMap::new();
        let mut unresolvable: BTreeMap<CanonicalKey, ExternalEntry> = BTreeMap::new();

        for (_, entry) in graph.references() {
            match entry.state {
                ReferenceState::Resolved(target) if !graph.origin(target).is_batch() => {
                    let artifact = graph.artifact(target);
                    let key = artifact.key();
                    let is_direct = artifact
                        .required_by
                        .iter()
                        .any(|id| graph.origin(*id).is_batch());
                    let bucket = if is_direct { &mut direct } else { &mut indirect };

                    bucket.entry(key.clone()).or_insert_with(|| ExternalEntry {
                        canonical: key,
                        kind: artifact.kind(),
                        resolved_from: Some(origin_label(graph.origin(target))),
                        required_by: requirer_keys(graph, &artifact.required_by),
                        chain: if is_direct {
                            Vec::new()
                        } else {
                            requirer_chain(graph, target)
                        },
                    });
                }
                ReferenceState::Unresolvable => {
                    let slot = unresolvable
                        .entry(entry.key.clone())
                        .or_insert_with(|| ExternalEntry {
                            canonical: entry.key.clone(),
                            kind: entry.kind,
                            resolved_from: None,
                            required_by: Vec::new(),
                            chain: Vec::new(),
                        });
                    let mut keys: BTreeSet<CanonicalKey> = slot.required_by.drain(..).collect();
                    keys.extend(requirer_keys(graph, &entry.required_by));
                    slot.required_by = keys.into_iter().collect();
                }
                _ => {}
            }
        }

        Self {
            direct: direct.into_values().collect(),
            indirect: indirect.into_values().collect(),
            unresolvable: unresolvable.into_values().collect(),
            skipped: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.indirect.is_empty() && self.unresolvable.is_empty()
    }
}

fn origin_label(origin: &ArtifactOrigin) -> String {
    match origin {
        ArtifactOrigin::Batch => "batch".to_string(),
        ArtifactOrigin::Package { package } => package.to_string(),
        ArtifactOrigin::External => "external".to_string(),
    }
}

/// Sorted, de-duplicated keys of the given artifacts
fn requirer_keys(graph: &DependencyGraph, ids: &[ArtifactId]) -> Vec<CanonicalKey> {
    let keys: BTreeSet<CanonicalKey> = ids
        .iter()
        .map(|id| graph.artifact(*id))
        .map(|a| a.canonical_url().map(|_| a.key()).unwrap_or_else(|| CanonicalKey::new(a.label(), None)))
        .collect();
    keys.into_iter().collect()
}

/// Breadth-first walk up `required_by` links until a batch artifact is reached
fn requirer_chain(graph: &DependencyGraph, start: ArtifactId) -> Vec<CanonicalKey> {
    let mut parent: HashMap<ArtifactId, ArtifactId> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    let mut found = None;

    while let Some(current) = queue.pop_front() {
        if current != start && graph.origin(current).is_batch() {
            found = Some(current);
            break;
        }
        let mut requirers = graph.artifact(current).required_by.clone();
        requirers.sort_by_key(|id| graph.artifact(*id).key());
        for requirer in requirers {
            if requirer != start && !parent.contains_key(&requirer) {
                parent.insert(requirer, current);
                queue.push_back(requirer);
            }
        }
    }

    let mut chain = Vec::new();
    let mut cursor = found;
    while let Some(id) = cursor {
        if id == start {
            break;
        }
        chain.push(graph.artifact(id).key());
        cursor = parent.get(&id).copied();
    }
    chain.reverse();
    chain
}
