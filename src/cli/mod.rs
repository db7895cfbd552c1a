//! # Command-Line Interface
//!
//! User-facing commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `order` | Print the dependency-respecting load order |
//! | `deps` | Direct, indirect and unresolvable external dependencies |
//! | `cycles` | References between batch artifacts that close a cycle |
//! | `bundle` | Write the ordered artifacts as a transaction bundle |
//!
//! ## Output Formats
//!
//! All commands support `--format`:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Warnings collected during a run go to stderr in text mode and into the
//! `result.issues` array in JSON mode.
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output, or set `RUST_LOG`:
//! ```bash
//! igload --verbose order ./my-ig
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod deps;
mod order;
mod output;
mod session;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
pub use session::{Session, SessionOptions};
