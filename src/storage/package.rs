//! Package loading
//!
//! Reads an IG directory as the batch and materializes its dependency
//! packages from the local package cache (`<cache>/<id>#<version>/package/`).
//! Each `(id, version)` is loaded at most once, so manifests declaring
//! cyclic dependencies still terminate.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::resource::{read_resource_dir, strip_bom};
use crate::domain::{Artifact, PackageKey, PackageNode, PackageTree};

/// Package manifest file name
pub const MANIFEST_FILE: &str = "package.json";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("IG directory not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid package manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },
}

/// The parts of `package.json` the loader needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    pub version: String,

    /// Package id -> version, kept sorted by package id
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Reads `package.json` from a directory, if present
    pub fn read(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let manifest: PackageManifest =
            serde_json::from_str(strip_bom(&content)).map_err(|e| PackageError::InvalidManifest {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        Ok(Some(manifest))
    }

    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.name, &self.version)
    }

    /// Declared dependencies, sorted by package id
    ///
    /// The order `package.json` lists them in is not preserved.
    pub fn dependency_keys(&self) -> Vec<PackageKey> {
        self.dependencies
            .iter()
            .map(|(id, version)| PackageKey::new(id, version))
            .collect()
    }
}

/// An IG read from disk: the batch plus its package tree
#[derive(Debug)]
pub struct LoadedIg {
    pub key: PackageKey,
    pub artifacts: Vec<Artifact>,
    pub tree: PackageTree,
}

/// Loads IGs and their dependency packages
#[derive(Debug, Clone, Default)]
pub struct PackageLoader {
    cache_dirs: Vec<PathBuf>,
}

impl PackageLoader {
    pub fn new(cache_dirs: Vec<PathBuf>) -> Self {
        Self { cache_dirs }
    }

    pub fn cache_dirs(&self) -> &[PathBuf] {
        &self.cache_dirs
    }

    /// Reads an IG directory and loads its dependency tree
    ///
    /// Resources are read from `dir/package/` when the IG is laid out as an
    /// unpacked package, otherwise from `dir` itself. Without a manifest the
    /// IG has no dependencies.
    pub fn load_ig(&self, dir: &Path) -> Result<LoadedIg> {
        if !dir.is_dir() {
            return Err(PackageError::NotFound(dir.to_path_buf()).into());
        }

        let resource_dir = if dir.join("package").join(MANIFEST_FILE).exists() {
            dir.join("package")
        } else {
            dir.to_path_buf()
        };

        let manifest = PackageManifest::read(&resource_dir)?;
        let key = match &manifest {
            Some(m) => m.key(),
            None => PackageKey::new(
                dir.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "ig".to_string()),
                "current",
            ),
        };

        let artifacts = read_resource_dir(&resource_dir, Some(&key))?;

        let mut root = PackageNode::new(key.clone());
        if let Some(manifest) = &manifest {
            for dep in manifest.dependency_keys() {
                root = root.with_dependency(dep);
            }
        }

        let tree = self.load_tree(root)?;
        info!(
            ig = %key,
            artifacts = artifacts.len(),
            packages = tree.len(),
            missing = tree.missing().count(),
            "Loaded IG"
        );

        Ok(LoadedIg { key, artifacts, tree })
    }

    /// Materializes the dependency tree below `root`
    ///
    /// Packages missing from every cache, or with unreadable manifests, are
    /// recorded as missing; they never fail the load.
    pub fn load_tree(&self, root: PackageNode) -> Result<PackageTree> {
        let mut tree = PackageTree::new();
        let mut visited: HashSet<PackageKey> = HashSet::new();
        let mut stack: Vec<PackageKey> = root.dependencies.iter().rev().cloned().collect();

        visited.insert(root.key.clone());
        tree.insert_root(root);

        while let Some(key) = stack.pop() {
            if !visited.insert(key.clone()) {
                continue;
            }

            let Some(dir) = self.find_package(&key) else {
                warn!(package = %key, "Dependency package not found in cache");
                tree.mark_missing(key);
                continue;
            };

            let manifest = match PackageManifest::read(&dir) {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!(package = %key, error = %format!("{:#}", e), "Unreadable package manifest");
                    tree.mark_missing(key);
                    continue;
                }
            };

            let artifacts = read_resource_dir(&dir, Some(&key))?;
            debug!(package = %key, artifacts = artifacts.len(), "Loaded package");

            let mut node = PackageNode::new(key).with_artifacts(artifacts);
            if let Some(manifest) = manifest {
                for dep in manifest.dependency_keys() {
                    node = node.with_dependency(dep);
                }
            }
            for dep in node.dependencies.iter().rev() {
                if !visited.contains(dep) {
                    stack.push(dep.clone());
                }
            }
            tree.insert(node);
        }

        Ok(tree)
    }

    /// Locates `<cache>/<id>#<version>/package` in the first cache holding it
    pub fn find_package(&self, key: &PackageKey) -> Option<PathBuf> {
        self.cache_dirs
            .iter()
            .map(|cache| cache.join(key.to_string()).join("package"))
            .find(|dir| dir.is_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_package(cache: &Path, id: &str, version: &str, deps: &[(&str, &str)], resources: &[(&str, &str)]) {
        let dir = cache.join(format!("{}#{}", id, version)).join("package");
        fs::create_dir_all(&dir).unwrap();
        let deps: BTreeMap<String, String> = deps
            .iter()
            .map(|(i, v)| (i.to_string(), v.to_string()))
            .collect();
        let manifest = PackageManifest {
            name: id.to_string(),
            version: version.to_string(),
            dependencies: deps,
        };
        fs::write(dir.join(MANIFEST_FILE), serde_json::to_string(&manifest).unwrap()).unwrap();
        for (file, body) in resources {
            fs::write(dir.join(file), body).unwrap();
        }
    }

    #[test]
    fn loads_ig_and_dependencies() {
        let cache = TempDir::new().unwrap();
        write_package(
            cache.path(),
            "dep.a",
            "1.0.0",
            &[("dep.b", "2.0.0")],
            &[("CodeSystem-x.json", r#"{"resourceType": "CodeSystem", "id": "x", "url": "http://a.org/cs/x"}"#)],
        );
        write_package(cache.path(), "dep.b", "2.0.0", &[], &[]);

        let ig = TempDir::new().unwrap();
        fs::write(
            ig.path().join(MANIFEST_FILE),
            r#"{"name": "my.ig", "version": "0.1.0", "dependencies": {"dep.a": "1.0.0"}}"#,
        )
        .unwrap();
        fs::write(
            ig.path().join("ValueSet-v.json"),
            r#"{"resourceType": "ValueSet", "id": "v", "url": "http://my.ig/vs/v"}"#,
        )
        .unwrap();

        let loaded = PackageLoader::new(vec![cache.path().to_path_buf()])
            .load_ig(ig.path())
            .unwrap();

        assert_eq!(loaded.key, PackageKey::new("my.ig", "0.1.0"));
        assert_eq!(loaded.artifacts.len(), 1);
        assert_eq!(loaded.tree.len(), 3);
        assert_eq!(loaded.tree.missing().count(), 0);

        let dep = loaded.tree.get(&PackageKey::new("dep.a", "1.0.0")).unwrap();
        assert_eq!(dep.artifacts.len(), 1);
        assert_eq!(dep.artifacts[0].source.as_ref().unwrap().package_id, "dep.a");
    }

    #[test]
    fn dependency_keys_sorted_by_package_id() {
        let manifest: PackageManifest = serde_json::from_str(
            r#"{"name": "my.ig", "version": "0.1.0", "dependencies": {"z.pkg": "1.0.0", "a.pkg": "2.0.0"}}"#,
        )
        .unwrap();

        assert_eq!(
            manifest.dependency_keys(),
            vec![PackageKey::new("a.pkg", "2.0.0"), PackageKey::new("z.pkg", "1.0.0")]
        );
    }

    #[test]
    fn manifest_with_byte_order_mark_is_read() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            "\u{feff}{\"name\": \"bom.pkg\", \"version\": \"1.0.0\"}",
        )
        .unwrap();

        let manifest = PackageManifest::read(dir.path()).unwrap().unwrap();
        assert_eq!(manifest.key(), PackageKey::new("bom.pkg", "1.0.0"));
    }

    #[test]
    fn damaged_file_in_dependency_package_is_skipped() {
        let cache = TempDir::new().unwrap();
        write_package(
            cache.path(),
            "dep.a",
            "1.0.0",
            &[],
            &[
                ("ValueSet-broken.json", "{ \"resourceType\": "),
                ("CodeSystem-x.json", "\u{feff}{\"resourceType\": \"CodeSystem\", \"id\": \"x\", \"url\": \"http://a.org/cs/x\"}"),
            ],
        );
        let loader = PackageLoader::new(vec![cache.path().to_path_buf()]);
        let root = PackageNode::new(PackageKey::new("my.ig", "0.1.0"))
            .with_dependency(PackageKey::new("dep.a", "1.0.0"));

        let tree = loader.load_tree(root).unwrap();

        let dep = tree.get(&PackageKey::new("dep.a", "1.0.0")).unwrap();
        let ids: Vec<&str> = dep.artifacts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["x"]);
    }

    #[test]
    fn missing_dependency_recorded() {
        let cache = TempDir::new().unwrap();
        let loader = PackageLoader::new(vec![cache.path().to_path_buf()]);
        let root = PackageNode::new(PackageKey::new("my.ig", "0.1.0"))
            .with_dependency(PackageKey::new("gone", "1.0.0"));

        let tree = loader.load_tree(root).unwrap();

        let missing: Vec<String> = tree.missing().map(|k| k.to_string()).collect();
        assert_eq!(missing, vec!["gone#1.0.0"]);
    }

    #[test]
    fn cyclic_manifests_terminate() {
        let cache = TempDir::new().unwrap();
        write_package(cache.path(), "a", "1", &[("b", "1")], &[]);
        write_package(cache.path(), "b", "1", &[("a", "1")], &[]);
        let loader = PackageLoader::new(vec![cache.path().to_path_buf()]);

        let tree = loader
            .load_tree(PackageNode::new(PackageKey::new("root", "1")).with_dependency(PackageKey::new("a", "1")))
            .unwrap();

        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn first_cache_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_package(second.path(), "a", "1", &[], &[]);
        write_package(first.path(), "a", "1", &[], &[]);

        let loader = PackageLoader::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        let dir = loader.find_package(&PackageKey::new("a", "1")).unwrap();

        assert!(dir.starts_with(first.path()));
    }

    #[test]
    fn ig_without_manifest_has_no_dependencies() {
        let ig = TempDir::new().unwrap();
        let loaded = PackageLoader::default().load_ig(ig.path()).unwrap();

        assert_eq!(loaded.key.version, "current");
        assert_eq!(loaded.tree.len(), 1);
    }

    #[test]
    fn invalid_ig_manifest_is_an_error() {
        let ig = TempDir::new().unwrap();
        fs::write(ig.path().join(MANIFEST_FILE), r#"{"version": 3}"#).unwrap();

        assert!(PackageLoader::default().load_ig(ig.path()).is_err());
    }

    #[test]
    fn missing_ig_dir_is_an_error() {
        let ig = TempDir::new().unwrap();
        assert!(PackageLoader::default().load_ig(&ig.path().join("nope")).is_err());
    }
}
