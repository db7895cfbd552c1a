//! Current-version selection
//!
//! When several artifacts share a canonical URL, one is picked as "current"
//! by a fixed composite ordering:
//!
//! 1. Status: active, draft, unknown, retired
//! 2. Provenance, descending: package id, package version, filename
//! 3. Resource id, ascending
//!
//! Uploaders rely on this exact rule to avoid loading ambiguous duplicates.

use std::cmp::Ordering;

use super::artifact::{Artifact, SourcePackage};
use super::canonical::compare_versions;

/// Outcome of a selection among candidates
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    /// The current artifact
    pub chosen: &'a Artifact,

    /// Number of candidates considered
    pub candidates: usize,

    /// Other candidates carrying the chosen version whose content differs
    pub conflicting: usize,

    /// True if `conflicting` is non-zero
    pub ambiguous: bool,
}

/// Picks the current artifact among candidates sharing a canonical URL
pub struct VersionSelector;

impl VersionSelector {
    /// Returns the current artifact, or `None` for an empty candidate list
    pub fn current<'a>(candidates: &[&'a Artifact]) -> Option<&'a Artifact> {
        Self::select(candidates).map(|selection| selection.chosen)
    }

    /// Like [`current`](Self::current), also reporting ambiguity
    pub fn select<'a>(candidates: &[&'a Artifact]) -> Option<Selection<'a>> {
        let chosen = candidates
            .iter()
            .copied()
            .min_by(|a, b| Self::precedence(a, b))?;

        // Several versions of one URL are normal; only rival copies of the
        // chosen version make the pick ambiguous.
        let conflicting = candidates
            .iter()
            .filter(|c| !std::ptr::eq(**c, chosen))
            .filter(|c| c.version == chosen.version && !equivalent(c, chosen))
            .count();

        Some(Selection {
            chosen,
            candidates: candidates.len(),
            conflicting,
            ambiguous: conflicting > 0,
        })
    }

    /// Composite ordering; `Less` means `a` is preferred over `b`
    pub fn precedence(a: &Artifact, b: &Artifact) -> Ordering {
        a.status
            .cmp(&b.status)
            .then_with(|| compare_provenance(b.source.as_ref(), a.source.as_ref()))
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Same resource body, or same decoded content when a body is missing
fn equivalent(a: &Artifact, b: &Artifact) -> bool {
    match (&a.payload, &b.payload) {
        (Some(x), Some(y)) => x == y,
        _ => a.id == b.id && a.status == b.status && a.content == b.content,
    }
}

/// Ascending provenance comparison; artifacts without provenance sort first
fn compare_provenance(a: Option<&SourcePackage>, b: Option<&SourcePackage>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a
            .package_id
            .cmp(&b.package_id)
            .then_with(|| compare_versions(&a.package_version, &b.package_version))
            .then_with(|| a.filename.cmp(&b.filename)),
    }
}
