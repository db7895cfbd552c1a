//! Directory-backed registry
//!
//! A local stand-in for a terminology or conformance server: every resource
//! found in the configured directories can be searched by kind and
//! canonical. Used as the resolver's external lookup.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::resource::read_resource_dir;
use crate::domain::{Artifact, ArtifactKind, CanonicalKey, ExternalLookup, LookupError};

/// Searchable set of resources read from directories
#[derive(Debug, Default)]
pub struct DirectoryRegistry {
    artifacts: Vec<Artifact>,
    unavailable: Vec<PathBuf>,
    dirs: usize,
}

impl DirectoryRegistry {
    /// Reads every directory; unreadable ones are remembered, not fatal
    pub fn open(dirs: &[PathBuf]) -> Self {
        let mut registry = Self {
            dirs: dirs.len(),
            ..Default::default()
        };

        for dir in dirs {
            match read_resource_dir(dir, None) {
                Ok(artifacts) => {
                    debug!(dir = %dir.display(), artifacts = artifacts.len(), "Registry directory indexed");
                    registry.artifacts.extend(artifacts);
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %format!("{:#}", e), "Registry directory unavailable");
                    registry.unavailable.push(dir.clone());
                }
            }
        }

        registry
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Directories that could not be read
    pub fn unavailable(&self) -> impl Iterator<Item = &Path> {
        self.unavailable.iter().map(PathBuf::as_path)
    }
}

impl ExternalLookup for DirectoryRegistry {
    fn search(&self, kind: ArtifactKind, canonical: &CanonicalKey) -> Result<Vec<Artifact>, LookupError> {
        if self.dirs > 0 && self.unavailable.len() == self.dirs {
            return Err(LookupError::Unavailable(format!(
                "none of {} registry directories could be read",
                self.dirs
            )));
        }

        let resource_type = kind.resource_type();
        Ok(self
            .artifacts
            .iter()
            .filter(|a| resource_type.map_or(true, |rt| a.resource_type == rt))
            .filter(|a| a.satisfies(canonical))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn registry_with(files: &[(&str, &str)]) -> (TempDir, DirectoryRegistry) {
        let dir = TempDir::new().unwrap();
        for (name, body) in files {
            fs::write(dir.path().join(name), body).unwrap();
        }
        let registry = DirectoryRegistry::open(&[dir.path().to_path_buf()]);
        (dir, registry)
    }

    #[test]
    fn search_filters_by_kind_and_canonical() {
        let (_dir, registry) = registry_with(&[
            ("cs.json", r#"{"resourceType": "CodeSystem", "id": "cs", "url": "http://r.org/x"}"#),
            ("vs.json", r#"{"resourceType": "ValueSet", "id": "vs", "url": "http://r.org/x"}"#),
        ]);

        let found = registry
            .search(ArtifactKind::CodeSystem, &CanonicalKey::parse("http://r.org/x"))
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "cs");
    }

    #[test]
    fn versioned_search_is_exact() {
        let (_dir, registry) = registry_with(&[(
            "cs.json",
            r#"{"resourceType": "CodeSystem", "id": "cs", "url": "http://r.org/x", "version": "1"}"#,
        )]);

        let hit = registry
            .search(ArtifactKind::CodeSystem, &CanonicalKey::parse("http://r.org/x|1"))
            .unwrap();
        let miss = registry
            .search(ArtifactKind::CodeSystem, &CanonicalKey::parse("http://r.org/x|2"))
            .unwrap();

        assert_eq!(hit.len(), 1);
        assert!(miss.is_empty());
    }

    #[test]
    fn unreadable_registry_reports_unavailable() {
        let dir = TempDir::new().unwrap();
        let registry = DirectoryRegistry::open(&[dir.path().join("missing")]);

        assert_eq!(registry.unavailable().count(), 1);
        let result = registry.search(ArtifactKind::ValueSet, &CanonicalKey::parse("http://r.org/x"));
        assert!(matches!(result, Err(LookupError::Unavailable(_))));
    }
}
