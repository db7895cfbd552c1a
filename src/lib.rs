//! igload - Dependency-ordered loading of FHIR conformance artifacts
//!
//! Given an implementation guide's profiles, extensions, value sets, code
//! systems and concept maps, igload discovers every canonical each artifact
//! references, resolves those references against the IG itself, its
//! dependency packages and an optional external registry, and orders the
//! result so that a server can load it without dangling references.
//! Reference cycles are broken deterministically instead of failing the run.

pub mod cli;
pub mod domain;
pub mod storage;

pub use domain::{
    Artifact, ArtifactKind, BundleOrderer, CanonicalKey, CanonicalScanner, DependencyResolver,
    LoadPlan, LoadPlanner, PackageTree, VersionSelector,
};
