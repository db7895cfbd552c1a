//! Conformance artifact model
//!
//! An artifact is one decoded conformance resource plus the bookkeeping the
//! engine attaches to it: the references it makes (`outgoing_refs`) and the
//! artifacts that require it (`required_by`). Back-links are arena indices
//! into the owning [`DependencyGraph`](super::DependencyGraph), never direct
//! object links.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::canonical::CanonicalKey;
use super::content::{CodeSystemContent, ConceptMapContent, ProfileContent, ValueSetContent};

/// Stable index of an artifact inside a dependency graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactId(pub usize);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of conformance artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Profile,
    ValueSet,
    CodeSystem,
    ConceptMap,
    Other,
}

impl ArtifactKind {
    /// Maps a FHIR `resourceType` onto an artifact kind
    pub fn from_resource_type(resource_type: &str) -> Self {
        match resource_type {
            "StructureDefinition" => ArtifactKind::Profile,
            "ValueSet" => ArtifactKind::ValueSet,
            "CodeSystem" => ArtifactKind::CodeSystem,
            "ConceptMap" => ArtifactKind::ConceptMap,
            _ => ArtifactKind::Other,
        }
    }

    /// The FHIR resource type searched for this kind
    pub fn resource_type(&self) -> Option<&'static str> {
        match self {
            ArtifactKind::Profile => Some("StructureDefinition"),
            ArtifactKind::ValueSet => Some("ValueSet"),
            ArtifactKind::CodeSystem => Some("CodeSystem"),
            ArtifactKind::ConceptMap => Some("ConceptMap"),
            ArtifactKind::Other => None,
        }
    }

    /// Returns true if other artifacts can reference this kind by canonical URL
    pub fn is_referencable(&self) -> bool {
        !matches!(self, ArtifactKind::Other)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactKind::Profile => "profile",
            ArtifactKind::ValueSet => "value_set",
            ArtifactKind::CodeSystem => "code_system",
            ArtifactKind::ConceptMap => "concept_map",
            ArtifactKind::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Publication status
///
/// Declaration order is the selection precedence: active resources are
/// preferred, retired ones picked last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Active,
    Draft,
    #[default]
    Unknown,
    Retired,
}

impl ArtifactStatus {
    /// Parses a FHIR `status` code; anything unrecognised is `Unknown`
    pub fn from_code(code: &str) -> Self {
        match code {
            "active" => ArtifactStatus::Active,
            "draft" => ArtifactStatus::Draft,
            "retired" => ArtifactStatus::Retired,
            _ => ArtifactStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Active => "active",
            ArtifactStatus::Draft => "draft",
            ArtifactStatus::Unknown => "unknown",
            ArtifactStatus::Retired => "retired",
        }
    }
}

/// Where an artifact was read from (provenance, not ownership)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePackage {
    pub package_id: String,
    pub package_version: String,
    pub filename: String,
}

impl SourcePackage {
    pub fn new(
        package_id: impl Into<String>,
        package_version: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            package_id: package_id.into(),
            package_version: package_version.into(),
            filename: filename.into(),
        }
    }
}

impl fmt::Display for SourcePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}/{}",
            self.package_id, self.package_version, self.filename
        )
    }
}

/// Kind-specific payload, one variant per artifact kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactContent {
    Profile(ProfileContent),
    ValueSet(ValueSetContent),
    CodeSystem(CodeSystemContent),
    ConceptMap(ConceptMapContent),
    Other,
}

impl ArtifactContent {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactContent::Profile(_) => ArtifactKind::Profile,
            ArtifactContent::ValueSet(_) => ArtifactKind::ValueSet,
            ArtifactContent::CodeSystem(_) => ArtifactKind::CodeSystem,
            ArtifactContent::ConceptMap(_) => ArtifactKind::ConceptMap,
            ArtifactContent::Other => ArtifactKind::Other,
        }
    }
}

/// One conformance artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// FHIR resource type (e.g., `StructureDefinition`)
    pub resource_type: String,

    /// Logical resource id
    pub id: String,

    /// Canonical URL (absent for non-referencable or malformed artifacts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Business version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub status: ArtifactStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Provenance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourcePackage>,

    pub content: ArtifactContent,

    /// Raw canonical references, possibly `|version` suffixed
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub outgoing_refs: BTreeSet<String>,

    /// Artifacts that required this one (append-only, reporting only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_by: Vec<ArtifactId>,

    /// The decoded resource as read, kept for the output bundle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Top-level members that could not be decoded and were not scanned
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_fields: Vec<String>,
}

impl Artifact {
    /// Creates an artifact with no references and no provenance
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>, content: ArtifactContent) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            url: None,
            version: None,
            status: ArtifactStatus::Unknown,
            name: None,
            source: None,
            content,
            outgoing_refs: BTreeSet::new(),
            required_by: Vec::new(),
            payload: None,
            invalid_fields: Vec::new(),
        }
    }

    /// Sets the canonical URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the business version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_status(mut self, status: ArtifactStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_source(mut self, source: SourcePackage) -> Self {
        self.source = Some(source);
        self
    }

    pub fn kind(&self) -> ArtifactKind {
        self.content.kind()
    }

    /// Canonical URL, treating an empty string as absent
    pub fn canonical_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }

    /// The `(url, version)` identity; empty url for artifacts without one
    pub fn key(&self) -> CanonicalKey {
        CanonicalKey::new(
            self.canonical_url().unwrap_or_default(),
            self.version.clone(),
        )
    }

    /// Returns true if this artifact satisfies the given reference key
    pub fn satisfies(&self, key: &CanonicalKey) -> bool {
        match self.canonical_url() {
            Some(url) => key.matches(url, self.version.as_deref()),
            None => false,
        }
    }

    /// Returns true if a referencable kind is missing its canonical URL, or
    /// if some of its content could not be decoded
    pub fn is_malformed(&self) -> bool {
        self.malformation().is_some()
    }

    /// What is wrong with a malformed artifact
    pub fn malformation(&self) -> Option<String> {
        if self.kind().is_referencable() && self.canonical_url().is_none() {
            return Some(format!("{} without a canonical URL cannot be referenced", self.resource_type));
        }
        if !self.invalid_fields.is_empty() {
            return Some(format!("invalid {} ignored", self.invalid_fields.join(", ")));
        }
        None
    }

    /// Label for logs and reports: the canonical key, or `Type/id`
    pub fn label(&self) -> String {
        match self.canonical_url() {
            Some(_) => self.key().to_string(),
            None => format!("{}/{}", self.resource_type, self.id),
        }
    }
}
