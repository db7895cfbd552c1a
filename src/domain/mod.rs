//! Domain models for igload
//!
//! The dependency-graph engine: scanning, version selection, resolution,
//! cycle detection and ordering. No I/O; collaborators plug in through
//! [`ExternalLookup`] and the [`PackageTree`] the caller builds.

mod artifact;
mod canonical;
mod content;
mod core;
mod cycle;
mod graph;
mod order;
mod package;
mod plan;
mod report;
mod resolver;
mod scanner;
mod version;

pub use artifact::{Artifact, ArtifactContent, ArtifactId, ArtifactKind, ArtifactStatus, SourcePackage};
pub use canonical::{compare_versions, strip_version, CanonicalKey};
pub use content::{
    AdditionalBinding, CodeSystemContent, Compose, ConceptMapContent, ConceptSet, ElementBinding,
    ElementDefinition, ElementList, Extension, MapDependency, MapElement, MapGroup, MapTarget,
    ProfileContent, TypeRef, Unmapped, ValueSetContent,
};
pub use self::core::{is_core_package, is_core_type_uri, CORE_TYPES};
pub use cycle::{artifact_has_circular_dependency, has_circular_dependency, ReferenceGraph};
pub use graph::{ArtifactOrigin, DependencyGraph, ReferenceEntry, ReferenceState};
pub use order::{BatchEdge, BundleOrderer, LoadOrder};
pub use package::{PackageKey, PackageNode, PackageTree};
pub use plan::{LoadPlan, LoadPlanner, PlanOptions};
pub use report::{DependencyReport, ExternalEntry, Issue, IssueKind, RunResult};
pub use resolver::{
    DependencyResolver, ExternalLookup, LookupError, Resolution, ResolveOutcome, ResolvedFrom,
};
pub use scanner::{CanonicalRef, CanonicalScanner, ScanOptions, ADDITIONAL_BINDING_EXTENSION};
pub use version::{Selection, VersionSelector};
