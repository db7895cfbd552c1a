//! Per-invocation wiring: configuration, package loading and planning

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::output::{Output, OutputFormat};
use crate::domain::{LoadPlan, LoadPlanner, PlanOptions};
use crate::storage::{Config, DirectoryRegistry, PackageLoader};

/// Global command-line overrides
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub config: Option<PathBuf>,
    pub package_cache: Vec<PathBuf>,
    pub registry: Vec<PathBuf>,
    pub keep_core: bool,
}

/// An IG opened with its layered configuration
pub struct Session {
    ig: PathBuf,
    config: Config,
    options: SessionOptions,
}

impl Session {
    pub fn open(ig: &Path, options: SessionOptions) -> Result<Self> {
        let config = Config::for_ig(ig, options.config.as_deref())?;

        Ok(Self {
            ig: ig.to_path_buf(),
            config,
            options,
        })
    }

    pub fn ig(&self) -> &Path {
        &self.ig
    }

    /// The command-line format, else the configured default
    pub fn format(&self, flag: Option<OutputFormat>) -> OutputFormat {
        flag.unwrap_or_else(|| self.config.default_format().into())
    }

    /// Package caches, command-line ones first
    pub fn cache_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.options.package_cache.clone();
        if dirs.is_empty() {
            dirs = self.config.cache_dirs();
        } else {
            dirs.extend(self.config.project.packages.cache_dirs.iter().cloned());
            dirs.extend(self.config.global.packages.cache_dirs.iter().cloned());
        }
        dirs
    }

    fn registry_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.options.registry.clone();
        dirs.extend(self.config.registry_dirs());
        dirs
    }

    /// Loads the IG and its packages and runs the planner
    ///
    /// `include_dependencies` comes from the command line; `None` falls back
    /// to the configuration.
    pub fn plan(&self, include_dependencies: Option<bool>, output: &Output) -> Result<LoadPlan> {
        let cache_dirs = self.cache_dirs();
        output.verbose_ctx("plan", &format!("Package caches: {:?}", cache_dirs));

        let loaded = PackageLoader::new(cache_dirs).load_ig(&self.ig)?;
        output.verbose_ctx(
            "plan",
            &format!(
                "Loaded {} ({} artifacts, {} packages)",
                loaded.key,
                loaded.artifacts.len(),
                loaded.tree.len()
            ),
        );
        for missing in loaded.tree.missing() {
            output.verbose_ctx("plan", &format!("Missing dependency package: {}", missing));
        }

        let mut scan = self.config.scan_options();
        scan.keep_core_types |= self.options.keep_core;
        let options = PlanOptions {
            scan,
            include_dependencies: include_dependencies.unwrap_or_else(|| self.config.include_dependencies()),
        };

        let registry_dirs = self.registry_dirs();
        let registry = if registry_dirs.is_empty() {
            None
        } else {
            output.verbose_ctx("plan", &format!("Registry directories: {:?}", registry_dirs));
            Some(DirectoryRegistry::open(&registry_dirs))
        };

        let mut planner = LoadPlanner::new(&loaded.tree, options);
        if let Some(registry) = &registry {
            planner = planner.with_lookup(registry);
        }

        Ok(planner.plan(loaded.artifacts))
    }
}
