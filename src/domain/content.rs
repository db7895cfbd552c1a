//! Kind-specific content of conformance artifacts
//!
//! Only the fields that can carry canonical references are modelled. Field
//! names follow FHIR JSON (camelCase); R4 and R5 spellings are both accepted
//! where they differ. Unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// A FHIR extension (only the canonical-bearing parts)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Extension {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_canonical: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_uri: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

impl Extension {
    /// Returns the canonical or uri value, whichever is present
    pub fn canonical_value(&self) -> Option<&str> {
        self.value_canonical
            .as_deref()
            .or(self.value_uri.as_deref())
    }

    /// Returns the first nested extension with the given url
    pub fn nested(&self, url: &str) -> Option<&Extension> {
        self.extension.iter().find(|e| e.url == url)
    }
}

// =============================================================================
// StructureDefinition
// =============================================================================

/// Profile-like content (StructureDefinition)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub differential: Option<ElementList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ElementList>,
}

impl ProfileContent {
    /// Elements carrying the profile's own constraints
    ///
    /// The differential when present, otherwise the snapshot.
    pub fn constrained_elements(&self) -> &[ElementDefinition] {
        match (&self.differential, &self.snapshot) {
            (Some(diff), _) => &diff.element,
            (None, Some(snap)) => &snap.element,
            (None, None) => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementList {
    pub element: Vec<ElementDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementDefinition {
    pub path: String,
    #[serde(rename = "type", skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<ElementBinding>,
    /// R5 `valueAlternatives`: extensions allowed in place of a primitive value
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub value_alternatives: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeRef {
    pub code: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub profile: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub target_profile: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementBinding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_set: Option<String>,
    /// R5 additional bindings
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional: Vec<AdditionalBinding>,
    /// R4 carries additional bindings as extensions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdditionalBinding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_set: Option<String>,
}

// =============================================================================
// ValueSet
// =============================================================================

/// ValueSet-like content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueSetContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compose: Option<Compose>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Compose {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<ConceptSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<ConceptSet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConceptSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub value_set: Vec<String>,
}

// =============================================================================
// CodeSystem
// =============================================================================

/// CodeSystem-like content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeSystemContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplements: Option<String>,
    /// The companion "all codes" value set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_set: Option<String>,
}

// =============================================================================
// ConceptMap
// =============================================================================

/// ConceptMap-like content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConceptMapContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_scope_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_scope_canonical: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_scope_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_scope_canonical: Option<String>,
    // R4 spellings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_canonical: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_canonical: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group: Vec<MapGroup>,
}

impl ConceptMapContent {
    /// Source and target scope URLs in either spelling
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        [
            &self.source_scope_uri,
            &self.source_scope_canonical,
            &self.target_scope_uri,
            &self.target_scope_canonical,
            &self.source_uri,
            &self.source_canonical,
            &self.target_uri,
            &self.target_canonical,
        ]
        .into_iter()
        .filter_map(|scope| scope.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub element: Vec<MapElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmapped: Option<Unmapped>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapElement {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<MapTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapTarget {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<MapDependency>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub product: Vec<MapDependency>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapDependency {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Unmapped {
    /// R4 redirect to another map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// R5 spelling of the redirect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_map: Option<String>,
}
