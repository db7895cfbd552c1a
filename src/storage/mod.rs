//! # Storage Layer
//!
//! Filesystem adapters around the engine: reading IGs and packages,
//! the directory registry, configuration and the output bundle.
//!
//! ## Layout
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | IG resources | FHIR JSON, one resource per file | `<ig>/` or `<ig>/package/` |
//! | IG manifest | `package.json` | next to the IG resources |
//! | Dependencies | unpacked FHIR packages | `<cache>/<id>#<version>/package/` |
//! | Project config | TOML | `<ig>/igload.toml` |
//! | Global config | TOML | `~/.config/igload/config.toml` |
//! | Output | FHIR transaction Bundle (JSON) | `--output` |
//!
//! ## Key Types
//!
//! - [`PackageLoader`] - Reads an IG and materializes its package tree
//! - [`DirectoryRegistry`] - External lookup over local resource directories
//! - [`Config`] - Project and global configuration

mod bundle;
mod config;
mod package;
mod registry;
mod resource;

pub use bundle::{transaction_bundle, write_transaction_bundle};
pub use config::{
    Config, ConfigError, GlobalConfig, OutputFormat, PackagesConfig, ProjectConfig, RegistryConfig,
    ScanConfig, PROJECT_CONFIG_FILE,
};
pub use package::{LoadedIg, PackageError, PackageLoader, PackageManifest, MANIFEST_FILE};
pub use registry::DirectoryRegistry;
pub use resource::{decode_resource, read_resource_dir, read_resource_file, ResourceError};
