//! FHIR resource decoding
//!
//! Turns resource JSON into [`Artifact`] records. The resource itself is
//! kept as the artifact payload so it can be written to the output bundle
//! unchanged.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Artifact, ArtifactContent, ArtifactKind, ArtifactStatus, PackageKey, SourcePackage};

/// Files in a package directory that are never resources
const NON_RESOURCE_FILES: &[&str] = &["package.json", ".index.json", "igload.toml"];

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Not a FHIR resource: missing resourceType")]
    NotAResource,

    #[error("{0} resource has no id")]
    MissingId(String),
}

/// Decodes one resource into an artifact
pub fn decode_resource(value: Value, source: Option<SourcePackage>) -> Result<Artifact, ResourceError> {
    let resource_type = string_field(&value, "resourceType").ok_or(ResourceError::NotAResource)?;
    let id = string_field(&value, "id").ok_or_else(|| ResourceError::MissingId(resource_type.clone()))?;

    let mut invalid = Vec::new();
    let content = match ArtifactKind::from_resource_type(&resource_type) {
        ArtifactKind::Profile => ArtifactContent::Profile(content(&value, &mut invalid)),
        ArtifactKind::ValueSet => ArtifactContent::ValueSet(content(&value, &mut invalid)),
        ArtifactKind::CodeSystem => ArtifactContent::CodeSystem(content(&value, &mut invalid)),
        ArtifactKind::ConceptMap => ArtifactContent::ConceptMap(content(&value, &mut invalid)),
        ArtifactKind::Other => ArtifactContent::Other,
    };
    if !invalid.is_empty() {
        debug!(resource = %format!("{}/{}", resource_type, id), fields = ?invalid, "Dropped undecodable members");
    }

    let mut artifact = Artifact::new(resource_type, id, content);
    artifact.invalid_fields = invalid;
    artifact.url = string_field(&value, "url").filter(|u| !u.is_empty());
    artifact.version = string_field(&value, "version");
    artifact.name = string_field(&value, "name");
    artifact.status = string_field(&value, "status")
        .map(|s| ArtifactStatus::from_code(&s))
        .unwrap_or_default();
    artifact.source = source;
    artifact.payload = Some(value);

    Ok(artifact)
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Decodes kind-specific content
///
/// Top-level members that do not decode on their own are left out and their
/// names pushed to `invalid`; the rest of the resource is still used.
fn content<T: DeserializeOwned + Default>(value: &Value, invalid: &mut Vec<String>) -> T {
    if let Ok(content) = T::deserialize(value) {
        return content;
    }
    let Some(members) = value.as_object() else {
        return T::default();
    };

    let mut kept = serde_json::Map::new();
    for (name, member) in members {
        let single: serde_json::Map<String, Value> =
            std::iter::once((name.clone(), member.clone())).collect();
        if T::deserialize(&Value::Object(single)).is_ok() {
            kept.insert(name.clone(), member.clone());
        } else {
            invalid.push(name.clone());
        }
    }

    T::deserialize(&Value::Object(kept)).unwrap_or_default()
}

/// Reads a resource file
///
/// Returns `Ok(None)` for JSON that is not a usable FHIR resource; those
/// files are skipped with a warning. I/O and JSON syntax errors propagate.
/// A leading byte order mark is ignored.
pub fn read_resource_file(path: &Path, package: Option<&PackageKey>) -> Result<Option<Artifact>> {
    let text = read_text(path)?;
    let value: Value = serde_json::from_str(strip_bom(&text))
        .with_context(|| format!("Failed to parse JSON: {}", path.display()))?;

    Ok(decode_file(value, path, package))
}

/// Reads every resource in a directory, sorted by filename
///
/// Only `*.json` files directly in `dir` are considered; package metadata
/// files are ignored. Files that are not valid JSON are skipped with a
/// warning, so one damaged file cannot sink a whole package.
pub fn read_resource_dir(dir: &Path, package: Option<&PackageKey>) -> Result<Vec<Artifact>> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !NON_RESOURCE_FILES.contains(&n))
        })
        .collect();
    paths.sort();

    let mut artifacts = Vec::new();
    for path in paths {
        let text = read_text(&path)?;
        let value: Value = match serde_json::from_str(strip_bom(&text)) {
            Ok(value) => value,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unparseable file");
                continue;
            }
        };
        if let Some(artifact) = decode_file(value, &path, package) {
            artifacts.push(artifact);
        }
    }

    debug!(dir = %dir.display(), artifacts = artifacts.len(), "Read resources");
    Ok(artifacts)
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read resource: {}", path.display()))
}

pub(crate) fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

fn decode_file(value: Value, path: &Path, package: Option<&PackageKey>) -> Option<Artifact> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let source = package.map(|p| SourcePackage::new(&p.id, &p.version, filename));

    match decode_resource(value, source) {
        Ok(artifact) => Some(artifact),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Skipping file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn decode_value_set() {
        let value = json!({
            "resourceType": "ValueSet",
            "id": "colors",
            "url": "http://a.org/ValueSet/colors",
            "version": "1.0.0",
            "status": "active",
            "name": "Colors",
            "compose": {"include": [{"system": "http://a.org/CodeSystem/colors"}]}
        });

        let artifact = decode_resource(value, None).unwrap();

        assert_eq!(artifact.kind(), ArtifactKind::ValueSet);
        assert_eq!(artifact.id, "colors");
        assert_eq!(artifact.canonical_url(), Some("http://a.org/ValueSet/colors"));
        assert_eq!(artifact.version.as_deref(), Some("1.0.0"));
        assert_eq!(artifact.status, ArtifactStatus::Active);
        assert!(artifact.payload.is_some());
        match &artifact.content {
            ArtifactContent::ValueSet(vs) => assert_eq!(vs.compose.as_ref().unwrap().include.len(), 1),
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn non_conformance_resource_is_other() {
        let value = json!({"resourceType": "Patient", "id": "example"});
        let artifact = decode_resource(value, None).unwrap();
        assert_eq!(artifact.kind(), ArtifactKind::Other);
        assert!(!artifact.is_malformed());
    }

    #[test]
    fn missing_resource_type_rejected() {
        let value = json!({"name": "my.ig", "version": "1.0.0"});
        assert!(matches!(decode_resource(value, None), Err(ResourceError::NotAResource)));
    }

    #[test]
    fn missing_id_rejected() {
        let value = json!({"resourceType": "CodeSystem", "url": "http://a.org/cs"});
        assert!(matches!(decode_resource(value, None), Err(ResourceError::MissingId(_))));
    }

    #[test]
    fn wrongly_typed_member_dropped_and_flagged() {
        let value = json!({
            "resourceType": "StructureDefinition",
            "id": "half",
            "url": "http://a.org/sd/half",
            "differential": "nope",
            "snapshot": {
                "element": [
                    { "path": "Observation.code", "binding": { "valueSet": "http://a.org/vs/codes" } }
                ]
            }
        });

        let artifact = decode_resource(value.clone(), None).unwrap();

        assert_eq!(artifact.invalid_fields, vec!["differential".to_string()]);
        assert!(artifact.is_malformed());
        assert_eq!(artifact.payload, Some(value));
        match &artifact.content {
            ArtifactContent::Profile(p) => {
                assert!(p.differential.is_none());
                assert_eq!(p.constrained_elements().len(), 1);
            }
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn directory_read_skips_metadata_and_non_resources() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name": "x", "version": "1"}"#).unwrap();
        fs::write(dir.path().join("notes.json"), r#"{"hello": "world"}"#).unwrap();
        fs::write(dir.path().join("readme.md"), "# readme").unwrap();
        fs::write(
            dir.path().join("CodeSystem-b.json"),
            r#"{"resourceType": "CodeSystem", "id": "b", "url": "http://a.org/cs/b"}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("CodeSystem-a.json"),
            r#"{"resourceType": "CodeSystem", "id": "a", "url": "http://a.org/cs/a"}"#,
        )
        .unwrap();

        let package = PackageKey::new("my.ig", "0.1.0");
        let artifacts = read_resource_dir(dir.path(), Some(&package)).unwrap();

        let ids: Vec<&str> = artifacts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(
            artifacts[0].source,
            Some(SourcePackage::new("my.ig", "0.1.0", "CodeSystem-a.json"))
        );
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(read_resource_file(&path, None).is_err());
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("CodeSystem-bom.json");
        fs::write(
            &path,
            "\u{feff}{\"resourceType\": \"CodeSystem\", \"id\": \"bom\", \"url\": \"http://a.org/cs/bom\"}",
        )
        .unwrap();

        let artifact = read_resource_file(&path, None).unwrap().unwrap();
        assert_eq!(artifact.canonical_url(), Some("http://a.org/cs/bom"));
    }

    #[test]
    fn unparseable_file_skipped_in_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(
            dir.path().join("CodeSystem-ok.json"),
            r#"{"resourceType": "CodeSystem", "id": "ok", "url": "http://a.org/cs/ok"}"#,
        )
        .unwrap();

        let artifacts = read_resource_dir(dir.path(), None).unwrap();

        let ids: Vec<&str> = artifacts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["ok"]);
    }
}
