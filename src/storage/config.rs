//! Configuration handling for igload
//!
//! Configuration is read from `igload.toml` at the IG root (project) and
//! `~/.config/igload/config.toml` (global). Project values override global
//! ones; command-line flags override both.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ScanOptions;

/// Name of the project configuration file at the IG root
pub const PROJECT_CONFIG_FILE: &str = "igload.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Where dependency packages come from
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PackagesConfig {
    /// Package cache directories holding `<id>#<version>/package/`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cache_dirs: Vec<PathBuf>,

    /// Add dependency artifacts to the bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_dependencies: Option<bool>,
}

/// Reference scanning settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Keep references to core type definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_core_references: Option<bool>,

    /// Canonicals never reported or resolved
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_canonicals: Vec<String>,
}

/// External lookup settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directories of FHIR resources searched when packages miss
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dirs: Vec<PathBuf>,
}

/// Project-level configuration (`igload.toml`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    pub packages: PackagesConfig,
    pub scan: ScanConfig,
    pub registry: RegistryConfig,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,

    pub packages: PackagesConfig,
    pub scan: ScanConfig,
    pub registry: RegistryConfig,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads the global configuration only
    ///
    /// `global_path` replaces the default global config location.
    pub fn load(global_path: Option<&Path>) -> Result<Self> {
        let global = Self::load_global(global_path)?;

        Ok(Self {
            project: ProjectConfig::default(),
            global,
            project_root: None,
        })
    }

    /// Loads configuration for the IG rooted at `ig_root`
    pub fn for_ig(ig_root: &Path, global_path: Option<&Path>) -> Result<Self> {
        let global = Self::load_global(global_path)?;
        let project = Self::load_project_config(ig_root)?;

        Ok(Self {
            project,
            global,
            project_root: Some(ig_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("org", "igload", "igload").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// The conventional FHIR package cache (`~/.fhir/packages`)
    pub fn default_package_cache() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.home_dir().join(".fhir").join("packages"))
    }

    /// Loads global configuration
    fn load_global(explicit: Option<&Path>) -> Result<GlobalConfig> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::global_config_dir() {
                Some(dir) => dir.join("config.toml"),
                None => return Ok(GlobalConfig::default()),
            },
        };

        if !config_path.exists() {
            if explicit.is_some() {
                anyhow::bail!("Config file not found: {}", config_path.display());
            }
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        let config: GlobalConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")?;
        validate_scan(&config.scan).context("Invalid global config")?;
        Ok(config)
    }

    /// Loads project configuration from an IG root
    ///
    /// Relative paths are resolved against the IG root.
    fn load_project_config(ig_root: &Path) -> Result<ProjectConfig> {
        let config_path = ig_root.join(PROJECT_CONFIG_FILE);

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        let mut config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")?;
        validate_scan(&config.scan).context("Invalid project config")?;

        for dir in config
            .packages
            .cache_dirs
            .iter_mut()
            .chain(config.registry.dirs.iter_mut())
        {
            if dir.is_relative() {
                *dir = ig_root.join(&*dir);
            }
        }

        Ok(config)
    }

    /// Effective package cache directories
    ///
    /// Project directories come first, then global ones; with neither, the
    /// conventional `~/.fhir/packages` cache.
    pub fn cache_dirs(&self) -> Vec<PathBuf> {
        let dirs: Vec<PathBuf> = self
            .project
            .packages
            .cache_dirs
            .iter()
            .chain(self.global.packages.cache_dirs.iter())
            .cloned()
            .collect();

        if dirs.is_empty() {
            Self::default_package_cache().into_iter().collect()
        } else {
            dirs
        }
    }

    pub fn include_dependencies(&self) -> bool {
        self.project
            .packages
            .include_dependencies
            .or(self.global.packages.include_dependencies)
            .unwrap_or(false)
    }

    /// Registry directories, project first
    pub fn registry_dirs(&self) -> Vec<PathBuf> {
        self.project
            .registry
            .dirs
            .iter()
            .chain(self.global.registry.dirs.iter())
            .cloned()
            .collect()
    }

    /// Scan options from both layers; ignored canonicals accumulate
    pub fn scan_options(&self) -> ScanOptions {
        let ignored: BTreeSet<String> = self
            .global
            .scan
            .ignored_canonicals
            .iter()
            .chain(self.project.scan.ignored_canonicals.iter())
            .cloned()
            .collect();

        ScanOptions {
            keep_core_types: self
                .project
                .scan
                .keep_core_references
                .or(self.global.scan.keep_core_references)
                .unwrap_or(false),
            core_canonicals: BTreeSet::new(),
            ignored,
        }
    }

    pub fn default_format(&self) -> OutputFormat {
        self.global.default_format
    }
}

fn validate_scan(scan: &ScanConfig) -> Result<(), ConfigError> {
    for canonical in &scan.ignored_canonicals {
        if canonical.trim().is_empty() || canonical.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "ignored canonical '{}' is not a URL",
                canonical
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = Config::default();

        assert_eq!(config.default_format(), OutputFormat::Text);
        assert!(!config.include_dependencies());
        assert!(config.registry_dirs().is_empty());
        assert!(!config.scan_options().keep_core_types);
    }

    #[test]
    fn parse_project_config() {
        let toml = r#"
[packages]
cache_dirs = ["/opt/fhir/packages"]
include_dependencies = true

[scan]
ignored_canonicals = ["http://example.org/ignored"]
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.packages.cache_dirs, vec![PathBuf::from("/opt/fhir/packages")]);
        assert_eq!(config.packages.include_dependencies, Some(true));
        assert_eq!(config.scan.ignored_canonicals, vec!["http://example.org/ignored"]);
    }

    #[test]
    fn parse_global_config() {
        let toml = r#"
default_format = "json"

[scan]
keep_core_references = true
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.default_format, OutputFormat::Json);
        assert_eq!(config.scan.keep_core_references, Some(true));
    }

    #[test]
    fn project_overrides_global() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global.toml");
        fs::write(
            &global,
            "[packages]\ninclude_dependencies = true\n[scan]\nignored_canonicals = [\"http://a.org/g\"]\n",
        )
        .unwrap();
        let ig = dir.path().join("ig");
        fs::create_dir_all(&ig).unwrap();
        fs::write(
            ig.join(PROJECT_CONFIG_FILE),
            "[packages]\ninclude_dependencies = false\n[scan]\nignored_canonicals = [\"http://a.org/p\"]\n",
        )
        .unwrap();

        let config = Config::for_ig(&ig, Some(&global)).unwrap();

        assert!(!config.include_dependencies());
        let scan_options = config.scan_options();
        let ignored: Vec<&str> = scan_options.ignored.iter().map(String::as_str).collect();
        assert_eq!(ignored, vec!["http://a.org/g", "http://a.org/p"]);
    }

    #[test]
    fn relative_dirs_resolved_against_ig_root() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[packages]\ncache_dirs = [\"cache\"]\n[registry]\ndirs = [\"registry\"]\n",
        )
        .unwrap();
        let missing_global = dir.path().join("no-global.toml");
        fs::write(&missing_global, "").unwrap();

        let config = Config::for_ig(dir.path(), Some(&missing_global)).unwrap();

        assert_eq!(config.cache_dirs(), vec![dir.path().join("cache")]);
        assert_eq!(config.registry_dirs(), vec![dir.path().join("registry")]);
    }

    #[test]
    fn explicit_global_must_exist() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(Some(&dir.path().join("nope.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_project_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(PROJECT_CONFIG_FILE), "[packages\n").unwrap();
        let global = dir.path().join("global.toml");
        fs::write(&global, "").unwrap();

        let err = Config::for_ig(dir.path(), Some(&global)).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse project config"));
    }

    #[test]
    fn blank_ignored_canonical_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[scan]\nignored_canonicals = [\"not a url\"]\n",
        )
        .unwrap();
        let global = dir.path().join("global.toml");
        fs::write(&global, "").unwrap();

        assert!(Config::for_ig(dir.path(), Some(&global)).is_err());
    }
}
