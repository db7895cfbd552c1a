//! Dependency report command

use anyhow::Result;

use super::output::Output;
use super::session::Session;
use crate::domain::ExternalEntry;

/// Show external dependencies and unresolvable references
pub fn deps(session: &Session, output: &Output) -> Result<()> {
    let plan = session.plan(Some(false), output)?;
    let report = &plan.report;
    output.verbose_ctx(
        "deps",
        &format!(
            "{} direct, {} indirect, {} unresolvable",
            report.direct.len(),
            report.indirect.len(),
            report.unresolvable.len()
        ),
    );

    if output.is_json() {
        output.data(&serde_json::json!({
            "ig": session.ig().display().to_string(),
            "report": report,
            "result": plan.result,
        }));
        return Ok(());
    }

    if report.is_empty() && report.skipped.is_empty() {
        println!("All references resolve inside the IG.");
    } else {
        print_entries(output, "Direct dependencies", &report.direct);
        print_entries(output, "Indirect dependencies", &report.indirect);
        print_entries(output, "Unresolvable", &report.unresolvable);

        if !report.skipped.is_empty() {
            output.heading("Skipped (provided by the base specification)", report.skipped.len());
            for key in &report.skipped {
                println!("  {}", key);
            }
            output.blank();
        }
    }

    output.issues(&plan.result.issues);
    Ok(())
}

fn print_entries(output: &Output, title: &str, entries: &[ExternalEntry]) {
    if entries.is_empty() {
        return;
    }

    output.heading(title, entries.len());
    for entry in entries {
        match &entry.resolved_from {
            Some(from) => println!("  {} [{}] from {}", entry.canonical, entry.kind, from),
            None => println!("  {} [{}]", entry.canonical, entry.kind),
        }

        let required_by: Vec<String> = entry.required_by.iter().map(|k| k.to_string()).collect();
        println!("      required by: {}", required_by.join(", "));

        if !entry.chain.is_empty() {
            let chain: Vec<String> = entry.chain.iter().map(|k| k.to_string()).collect();
            println!("      via: {}", chain.join(" <- "));
        }
    }
    output.blank();
}
