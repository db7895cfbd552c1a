//! Dependency resolution
//!
//! Resolves canonical references against the package tree, falling back to
//! an optional external lookup. All matches across the tree are collected
//! before [`VersionSelector`] picks one, since the same canonical can ship in
//! several dependency packages. A missing or failing lookup degrades to
//! "unresolved" for that one reference.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::artifact::{Artifact, ArtifactKind};
use super::canonical::CanonicalKey;
use super::graph::{ArtifactOrigin, DependencyGraph};
use super::package::{PackageKey, PackageTree};
use super::report::{Issue, IssueKind, RunResult};
use super::scanner::CanonicalScanner;
use super::version::VersionSelector;

/// Failure of the external lookup capability
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    #[error("registry lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("registry lookup failed: {0}")]
    Failed(String),
}

/// Out-of-process search for artifacts by kind and canonical
///
/// May return zero, one or many matches; the resolver disambiguates.
pub trait ExternalLookup {
    fn search(&self, kind: ArtifactKind, canonical: &CanonicalKey) -> Result<Vec<Artifact>, LookupError>;
}

/// Where a resolved artifact came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFrom {
    Package(PackageKey),
    External,
}

/// A successful resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    pub artifact: Artifact,
    pub from: ResolvedFrom,
    pub candidates: usize,
    /// Rival copies of the chosen version with different content
    pub conflicting: usize,
    pub ambiguous: bool,
}

/// Outcome of resolving one canonical
#[derive(Debug)]
pub enum ResolveOutcome {
    Found(Resolution),
    NotFound,
    LookupFailed(LookupError),
}

impl ResolveOutcome {
    /// The resolution, treating lookup failure as not found
    pub fn resolved(self) -> Option<Resolution> {
        match self {
            ResolveOutcome::Found(resolution) => Some(resolution),
            _ => None,
        }
    }
}

/// Resolves references against a package tree and an optional lookup
pub struct DependencyResolver<'a> {
    tree: &'a PackageTree,
    lookup: Option<&'a dyn ExternalLookup>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(tree: &'a PackageTree) -> Self {
        Self { tree, lookup: None }
    }

    pub fn with_lookup(mut self, lookup: &'a dyn ExternalLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Resolves one canonical reference
    ///
    /// A versioned key only matches artifacts with exactly that version;
    /// there is no fallback to another version.
    pub fn resolve(&self, key: &CanonicalKey, kind: ArtifactKind) -> ResolveOutcome {
        let mut matches: Vec<(&PackageKey, &Artifact)> = Vec::new();
        self.tree.walk(|node| {
            matches.extend(
                node.artifacts
                    .iter()
                    .filter(|a| a.satisfies(key))
                    .map(|a| (&node.key, a)),
            );
        });

        if !matches.is_empty() {
            let candidates: Vec<&Artifact> = matches.iter().map(|(_, a)| *a).collect();
            if let Some(selection) = VersionSelector::select(&candidates) {
                let package = matches
                    .iter()
                    .find(|(_, a)| std::ptr::eq(*a, selection.chosen))
                    .map(|(p, _)| (*p).clone());
                if let Some(package) = package {
                    debug!(canonical = %key, package = %package, "Resolved from package");
                    return ResolveOutcome::Found(Resolution {
                        artifact: detached(selection.chosen),
                        from: ResolvedFrom::Package(package),
                        candidates: selection.candidates,
                        conflicting: selection.conflicting,
                        ambiguous: selection.ambiguous,
                    });
                }
            }
        }

        let Some(lookup) = self.lookup else {
            return ResolveOutcome::NotFound;
        };

        let found = match lookup.search(kind, key) {
            Ok(found) => found,
            Err(e) => return ResolveOutcome::LookupFailed(e),
        };
        let candidates: Vec<&Artifact> = found.iter().filter(|a| a.satisfies(key)).collect();
        match VersionSelector::select(&candidates) {
            Some(selection) => {
                debug!(canonical = %key, "Resolved through external lookup");
                ResolveOutcome::Found(Resolution {
                    artifact: detached(selection.chosen),
                    from: ResolvedFrom::External,
                    candidates: selection.candidates,
                    conflicting: selection.conflicting,
                    ambiguous: selection.ambiguous,
                })
            }
            None => ResolveOutcome::NotFound,
        }
    }

    /// Resolves every pending reference in the graph until none remain
    ///
    /// Resolved artifacts are added to the graph and scanned in turn, so
    /// transitive dependencies are pulled in. Each iteration moves one
    /// reference out of the pending state.
    pub fn resolve_pending(&self, graph: &mut DependencyGraph, scanner: &CanonicalScanner) -> RunResult {
        let mut result = RunResult::new();

        loop {
            let Some((raw, entry)) = graph.next_pending() else {
                break;
            };
            let raw = raw.to_string();
            let key = entry.key.clone();
            let kind = entry.kind;

            if let Some(known) = graph.find_known(&key) {
                graph.mark_resolved(&raw, known);
                continue;
            }

            match self.resolve(&key, kind) {
                ResolveOutcome::Found(resolution) => {
                    let origin = match &resolution.from {
                        ResolvedFrom::Package(package) => {
                            result.resolved_from_packages += 1;
                            ArtifactOrigin::Package {
                                package: package.clone(),
                            }
                        }
                        ResolvedFrom::External => {
                            result.resolved_externally += 1;
                            ArtifactOrigin::External
                        }
                    };

                    if resolution.ambiguous {
                        let provenance = resolution
                            .artifact
                            .source
                            .as_ref()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "external lookup".to_string());
                        let version = resolution
                            .artifact
                            .version
                            .as_deref()
                            .unwrap_or("(unversioned)");
                        warn!(
                            canonical = %key,
                            version,
                            copies = resolution.conflicting + 1,
                            chosen = %provenance,
                            "Non-equivalent copies of one canonical version"
                        );
                        result.ambiguous += 1;
                        result.issue(Issue::new(
                            IssueKind::AmbiguousCandidate,
                            key.to_string(),
                            format!(
                                "{} non-equivalent copies of version {}, chose {}",
                                resolution.conflicting + 1,
                                version,
                                provenance
                            ),
                        ));
                    }

                    let id = graph.insert(resolution.artifact, origin);
                    graph.mark_resolved(&raw, id);

                    let refs = scanner.scan(graph.artifact(id));
                    result.scanned += 1;
                    result.references += refs.len();
                    graph.record_references(id, refs);
                }
                ResolveOutcome::NotFound => {
                    debug!(canonical = %key, "No artifact satisfies reference");
                    graph.mark_unresolvable(&raw);
                    result.unresolved += 1;
                    result.issue(Issue::new(
                        IssueKind::UnresolvableReference,
                        key.to_string(),
                        format!("no {} found in packages or registry", kind),
                    ));
                }
                ResolveOutcome::LookupFailed(e) => {
                    warn!(canonical = %key, error = %e, "External lookup failed, treating as unresolved");
                    graph.mark_unresolvable(&raw);
                    result.lookup_failures += 1;
                    result.unresolved += 1;
                    result.issue(Issue::new(
                        IssueKind::UnresolvableReference,
                        key.to_string(),
                        e.to_string(),
                    ));
                }
            }
        }

        result
    }
}

/// Copy of a package artifact without graph bookkeeping from elsewhere
fn detached(artifact: &Artifact) -> Artifact {
    let mut copy = artifact.clone();
    copy.outgoing_refs.clear();
    copy.required_by.clear();
    copy
}
