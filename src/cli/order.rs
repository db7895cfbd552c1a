//! Ordering commands (order, cycles, bundle)

use std::path::Path;

use anyhow::Result;

use super::output::Output;
use super::session::Session;
use crate::domain::{ArtifactOrigin, BundleOrderer, RunResult};
use crate::storage::write_transaction_bundle;

/// Print the load order
pub fn order(session: &Session, output: &Output, include_dependencies: Option<bool>) -> Result<()> {
    let plan = session.plan(include_dependencies, output)?;
    output.verbose_ctx("order", &format!("Ordered {} artifacts", plan.bundle.len()));

    if output.is_json() {
        let items: Vec<_> = plan
            .bundle
            .iter()
            .enumerate()
            .map(|(position, id)| {
                let artifact = plan.graph.artifact(*id);
                serde_json::json!({
                    "position": position + 1,
                    "resource_type": artifact.resource_type,
                    "id": artifact.id,
                    "url": artifact.canonical_url(),
                    "version": artifact.version,
                    "origin": plan.graph.origin(*id),
                })
            })
            .collect();
        output.data(&serde_json::json!({
            "order": items,
            "result": plan.result,
        }));
    } else if plan.bundle.is_empty() {
        println!("No artifacts to load.");
    } else {
        output.heading("Load order", plan.bundle.len());
        println!("{:<5} {:<20} {:<50} FROM", "#", "TYPE", "CANONICAL");
        println!("{}", "-".repeat(90));
        for (position, id) in plan.bundle.iter().enumerate() {
            let artifact = plan.graph.artifact(*id);
            println!(
                "{:<5} {:<20} {:<50} {}",
                position + 1,
                artifact.resource_type,
                artifact.label(),
                origin_label(plan.graph.origin(*id))
            );
        }
        output.blank();
        print_summary(&plan.result);
        output.issues(&plan.result.issues);
    }

    Ok(())
}

/// List batch references that close a cycle
pub fn cycles(session: &Session, output: &Output) -> Result<()> {
    let plan = session.plan(Some(false), output)?;
    let batch = plan.batch();
    let edges = BundleOrderer::cyclic_edges(&batch);
    output.verbose_ctx("cycles", &format!("Checked {} batch artifacts", batch.len()));

    if output.is_json() {
        let items: Vec<_> = edges
            .iter()
            .map(|edge| {
                serde_json::json!({
                    "from": batch[edge.from].label(),
                    "to": batch[edge.to].label(),
                    "reference": edge.raw,
                })
            })
            .collect();
        output.data(&items);
    } else if edges.is_empty() {
        println!("No reference cycles.");
    } else {
        output.heading("Cyclic references", edges.len());
        for edge in &edges {
            println!("  {} -> {}", batch[edge.from].label(), edge.raw);
        }
    }

    Ok(())
}

/// Write the ordered artifacts as a transaction bundle
pub fn bundle(
    session: &Session,
    output: &Output,
    path: &Path,
    include_dependencies: Option<bool>,
) -> Result<()> {
    let plan = session.plan(include_dependencies, output)?;
    let count = write_transaction_bundle(path, plan.ordered())?;
    output.verbose_ctx("bundle", &format!("Wrote {}", path.display()));

    if output.is_json() {
        output.data(&serde_json::json!({
            "bundle": path.display().to_string(),
            "entries": count,
            "result": plan.result,
        }));
    } else {
        output.success(&format!("Wrote {} entries to {}", count, path.display()));
        print_summary(&plan.result);
        output.issues(&plan.result.issues);
    }

    Ok(())
}

fn origin_label(origin: &ArtifactOrigin) -> String {
    match origin {
        ArtifactOrigin::Batch => "batch".to_string(),
        ArtifactOrigin::Package { package } => package.to_string(),
        ArtifactOrigin::External => "registry".to_string(),
    }
}

fn print_summary(result: &RunResult) {
    println!(
        "Scanned {} artifacts, {} references: {} in batch, {} from packages, {} from registry, {} unresolved; {} cycles broken, {} skipped",
        result.scanned,
        result.references,
        result.resolved_in_batch,
        result.resolved_from_packages,
        result.resolved_externally,
        result.unresolved,
        result.cycles_broken,
        result.skipped,
    );
}
