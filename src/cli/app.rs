//! Main CLI application structure

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::session::{Session, SessionOptions};
use super::{deps, order};

#[derive(Parser)]
#[command(name = "igload")]
#[command(author, version, about = "Dependency-ordered loading of FHIR conformance artifacts")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the configured format, else text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Global configuration file to use instead of the default location
    #[arg(long, global = true, env = "IGLOAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Package cache directory (repeatable, searched before configured caches)
    #[arg(long = "package-cache", global = true)]
    pub package_cache: Vec<PathBuf>,

    /// Directory of resources consulted when packages do not resolve a reference (repeatable)
    #[arg(long, global = true)]
    pub registry: Vec<PathBuf>,

    /// Treat references to base FHIR types as ordinary dependencies
    #[arg(long, global = true)]
    pub keep_core: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the order in which the IG's artifacts should be loaded
    Order {
        /// IG directory
        ig: PathBuf,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Report the artifacts the IG needs from outside itself
    Deps {
        /// IG directory
        ig: PathBuf,
    },

    /// List references between the IG's artifacts that form cycles
    Cycles {
        /// IG directory
        ig: PathBuf,
    },

    /// Write the ordered artifacts as a FHIR transaction bundle
    Bundle {
        /// IG directory
        ig: PathBuf,

        /// Bundle file to write
        #[arg(long, short = 'o')]
        output: PathBuf,

        #[command(flatten)]
        scope: ScopeArgs,
    },
}

/// Whether artifacts pulled in from dependency packages are part of the output
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ScopeArgs {
    /// Include the artifacts pulled in from dependency packages
    #[arg(long, overrides_with = "no_include_dependencies")]
    pub include_dependencies: bool,

    /// Only the IG's own artifacts, even if the configuration says otherwise
    #[arg(long, overrides_with = "include_dependencies")]
    pub no_include_dependencies: bool,
}

impl ScopeArgs {
    /// The flag's value, or `None` to defer to the configuration
    pub fn include_dependencies(&self) -> Option<bool> {
        match (self.include_dependencies, self.no_include_dependencies) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

impl Commands {
    /// The IG directory the command operates on
    pub fn ig(&self) -> &Path {
        match self {
            Commands::Order { ig, .. }
            | Commands::Deps { ig }
            | Commands::Cycles { ig }
            | Commands::Bundle { ig, .. } => ig,
        }
    }
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = SessionOptions {
        config: cli.config.clone(),
        package_cache: cli.package_cache.clone(),
        registry: cli.registry.clone(),
        keep_core: cli.keep_core,
    };
    let session = Session::open(cli.command.ig(), options)?;
    let output = Output::new(session.format(cli.format), cli.verbose);

    output.verbose(&format!("Opened IG at {}", session.ig().display()));

    match &cli.command {
        Commands::Order { scope, .. } => {
            order::order(&session, &output, scope.include_dependencies())?
        }
        Commands::Deps { .. } => deps::deps(&session, &output)?,
        Commands::Cycles { .. } => order::cycles(&session, &output)?,
        Commands::Bundle {
            output: path,
            scope,
            ..
        } => order::bundle(&session, &output, path, scope.include_dependencies())?,
    }

    output.verbose("Command completed successfully");
    Ok(())
}

/// Library diagnostics go to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "igload=debug" } else { "warn" })
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
