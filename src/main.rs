//! igload - Dependency-ordered loading of FHIR conformance artifacts

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = igload::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
