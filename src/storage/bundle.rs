//! Output bundle writer
//!
//! The ordered artifacts are handed to the uploader as a FHIR `transaction`
//! Bundle, one `PUT {resourceType}/{id}` entry per artifact in load order.
//! Each entry's `fullUrl` is a name-based `urn:uuid:` derived from the
//! artifact's identity and provenance, so it is unique within the bundle
//! and identical across runs.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::Artifact;

/// Builds a transaction bundle from artifacts in load order
pub fn transaction_bundle<'a>(
    artifacts: impl IntoIterator<Item = &'a Artifact>,
    generated_at: DateTime<Utc>,
) -> Value {
    let entries: Vec<Value> = artifacts.into_iter().map(entry).collect();

    json!({
        "resourceType": "Bundle",
        "type": "transaction",
        "timestamp": generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        "entry": entries,
    })
}

fn entry(artifact: &Artifact) -> Value {
    let reference = format!("{}/{}", artifact.resource_type, artifact.id);
    let resource = artifact.payload.clone().unwrap_or_else(|| {
        let mut minimal = json!({
            "resourceType": artifact.resource_type,
            "id": artifact.id,
        });
        if let Some(url) = artifact.canonical_url() {
            minimal["url"] = json!(url);
        }
        if let Some(version) = &artifact.version {
            minimal["version"] = json!(version);
        }
        minimal
    });

    json!({
        "fullUrl": full_url(artifact),
        "resource": resource,
        "request": {
            "method": "PUT",
            "url": reference,
        },
    })
}

/// `urn:uuid:` for an entry
fn full_url(artifact: &Artifact) -> String {
    let source = artifact
        .source
        .as_ref()
        .map(|s| s.to_string())
        .unwrap_or_default();
    let name = format!(
        "{}/{}|{}|{}",
        artifact.resource_type,
        artifact.id,
        artifact.key(),
        source
    );
    format!("urn:uuid:{}", Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()))
}

/// Writes the bundle to `path` (temp file + rename)
pub fn write_transaction_bundle<'a>(
    path: &Path,
    artifacts: impl IntoIterator<Item = &'a Artifact>,
) -> Result<usize> {
    let bundle = transaction_bundle(artifacts, Utc::now());
    let count = bundle["entry"].as_array().map_or(0, Vec::len);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let temp_path = path.with_extension("json.tmp");
    {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &bundle).context("Failed to serialize bundle")?;
        writeln!(writer).context("Failed to write bundle")?;
        writer.flush().context("Failed to flush bundle")?;
    }

    fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(count)
}
