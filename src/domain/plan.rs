//! Load planning
//!
//! Runs the whole engine over one batch: index the batch, scan it, resolve
//! pending references through the package tree and external lookup, order
//! the result and classify what left the batch.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::artifact::{Artifact, ArtifactId};
use super::canonical::CanonicalKey;
use super::graph::{ArtifactOrigin, DependencyGraph, ReferenceState};
use super::order::{BundleOrderer, LoadOrder};
use super::package::PackageTree;
use super::report::{DependencyReport, Issue, IssueKind, RunResult};
use super::resolver::{DependencyResolver, ExternalLookup};
use super::scanner::{CanonicalScanner, ScanOptions};

/// Options for a planning run
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub scan: ScanOptions,

    /// Add artifacts resolved from dependency packages to the bundle
    pub include_dependencies: bool,
}

/// Everything a run produced
#[derive(Debug)]
pub struct LoadPlan {
    pub graph: DependencyGraph,

    /// Artifacts in load order
    pub bundle: Vec<ArtifactId>,

    pub report: DependencyReport,
    pub result: RunResult,
}

impl LoadPlan {
    /// Bundle artifacts in load order
    pub fn ordered(&self) -> impl Iterator<Item = &Artifact> {
        self.bundle.iter().map(|id| self.graph.artifact(*id))
    }

    /// Batch artifacts only, in insertion order
    pub fn batch(&self) -> Vec<&Artifact> {
        self.graph.batch_ids().map(|id| self.graph.artifact(id)).collect()
    }
}

/// Plans the load of a batch against a package tree
pub struct LoadPlanner<'a> {
    options: PlanOptions,
    tree: &'a PackageTree,
    lookup: Option<&'a dyn ExternalLookup>,
}

impl<'a> LoadPlanner<'a> {
    pub fn new(tree: &'a PackageTree, options: PlanOptions) -> Self {
        Self {
            options,
            tree,
            lookup: None,
        }
    }

    pub fn with_lookup(mut self, lookup: &'a dyn ExternalLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn plan(&self, batch: Vec<Artifact>) -> LoadPlan {
        let mut scan = self.options.scan.clone();
        scan.core_canonicals.extend(self.tree.core_canonicals());
        let scanner = CanonicalScanner::new(scan);

        let mut result = RunResult::new();
        let mut graph = DependencyGraph::new();
        let mut skipped: BTreeSet<CanonicalKey> = BTreeSet::new();

        for artifact in batch {
            if let Some(url) = artifact.canonical_url() {
                if scanner.options().core_canonicals.contains(url) {
                    debug!(artifact = %artifact.label(), "Skipping artifact shipped by the base specification");
                    skipped.insert(artifact.key());
                    result.skipped += 1;
                    continue;
                }
            }
            if let Some(problem) = artifact.malformation() {
                warn!(artifact = %artifact.label(), problem = %problem, "Malformed artifact");
                result.issue(Issue::new(IssueKind::MalformedArtifact, artifact.label(), problem));
            }
            graph.insert(artifact, ArtifactOrigin::Batch);
        }

        let batch_ids: Vec<ArtifactId> = graph.batch_ids().collect();
        for id in &batch_ids {
            let refs = scanner.scan(graph.artifact(*id));
            result.scanned += 1;
            result.references += refs.len();
            graph.record_references(*id, refs);
        }
        debug!(
            artifacts = batch_ids.len(),
            pending = graph.pending_count(),
            "Scanned batch"
        );

        let mut resolver = DependencyResolver::new(self.tree);
        if let Some(lookup) = self.lookup {
            resolver = resolver.with_lookup(lookup);
        }
        result.merge(resolver.resolve_pending(&mut graph, &scanner));

        result.resolved_in_batch = graph
            .references()
            .filter(|(_, entry)| match entry.state {
                ReferenceState::Resolved(target) => graph.origin(target).is_batch(),
                _ => false,
            })
            .count();

        let mut members: Vec<ArtifactId> = Vec::new();
        if self.options.include_dependencies {
            members.extend(
                graph
                    .ids()
                    .filter(|id| matches!(graph.origin(*id), ArtifactOrigin::Package { .. })),
            );
        }
        members.extend(batch_ids.iter().copied());

        let artifacts: Vec<&Artifact> = members.iter().map(|id| graph.artifact(*id)).collect();
        let order: LoadOrder = BundleOrderer::order(&artifacts);
        for broken in &order.broken {
            let artifact = artifacts[*broken];
            result.issue(Issue::new(
                IssueKind::CyclicReference,
                artifact.label(),
                "emitted ahead of its dependencies to break a reference cycle",
            ));
        }
        result.cycles_broken += order.cycles_broken();
        let bundle: Vec<ArtifactId> = order.indices.iter().map(|i| members[*i]).collect();

        let mut report = DependencyReport::from_graph(&graph);
        report.skipped = skipped.into_iter().collect();

        info!(
            bundle = bundle.len(),
            direct = report.direct.len(),
            indirect = report.indirect.len(),
            unresolved = report.unresolvable.len(),
            cycles_broken = result.cycles_broken,
            "Planned load"
        );

        LoadPlan {
            graph,
            bundle,
            report,
            result,
        }
    }
}
