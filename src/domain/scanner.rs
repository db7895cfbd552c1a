//! Canonical reference scanning
//!
//! Extracts the outgoing canonical references of one artifact. Extraction is
//! fixed per artifact kind:
//!
//! | Kind | Fields |
//! |------|--------|
//! | Profile | type `profile`/`targetProfile`, binding `valueSet` (+ additional bindings), `valueAlternatives` |
//! | ValueSet | `compose.include`/`exclude`: `system` (+ `version`), `valueSet` |
//! | CodeSystem | `supplements`, `valueSet` |
//! | ConceptMap | scopes, group `source`/`target`, `dependsOn`/`product` systems, `unmapped` redirect |
//!
//! References to core type definitions and to canonicals shipped with the
//! base specification package are dropped.

use serde::Serialize;
use std::collections::BTreeSet;

use super::artifact::{Artifact, ArtifactContent, ArtifactKind};
use super::canonical::strip_version;
use super::content::{
    CodeSystemContent, ConceptMapContent, ConceptSet, ElementDefinition, ProfileContent,
    ValueSetContent,
};
use super::core::is_core_type_uri;

/// R4 extension carrying an additional binding
pub const ADDITIONAL_BINDING_EXTENSION: &str =
    "http://hl7.org/fhir/tools/StructureDefinition/additional-binding";

/// A raw canonical reference plus the kind of artifact expected at its target
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CanonicalRef {
    pub raw: String,
    pub kind: ArtifactKind,
}

impl CanonicalRef {
    pub fn new(raw: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            raw: raw.into(),
            kind,
        }
    }

    /// The reference without its version suffix
    pub fn url(&self) -> &str {
        strip_version(&self.raw)
    }
}

/// Options controlling which references survive a scan
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Keep references to core type definitions instead of dropping them
    pub keep_core_types: bool,

    /// Canonicals provided by the base specification package
    pub core_canonicals: BTreeSet<String>,

    /// Canonicals the caller never wants reported or resolved
    pub ignored: BTreeSet<String>,
}

/// Scanner for outgoing canonical references
#[derive(Debug, Clone, Default)]
pub struct CanonicalScanner {
    options: ScanOptions,
}

impl CanonicalScanner {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Returns the canonical references made by `artifact`
    ///
    /// Empty values are skipped, as is a reference from an artifact to itself.
    pub fn scan(&self, artifact: &Artifact) -> BTreeSet<CanonicalRef> {
        let mut refs = Collector::default();

        match &artifact.content {
            ArtifactContent::Profile(content) => scan_profile(content, &mut refs),
            ArtifactContent::ValueSet(content) => scan_value_set(content, &mut refs),
            ArtifactContent::CodeSystem(content) => scan_code_system(content, &mut refs),
            ArtifactContent::ConceptMap(content) => scan_concept_map(content, &mut refs),
            ArtifactContent::Other => {}
        }

        let own_url = artifact.canonical_url();
        refs.0
            .into_iter()
            .filter(|r| Some(r.url()) != own_url)
            .filter(|r| self.keep(r))
            .collect()
    }

    /// Returns true if a reference should be recorded
    pub fn keep(&self, reference: &CanonicalRef) -> bool {
        let url = reference.url();
        if !self.options.keep_core_types && is_core_type_uri(url) {
            return false;
        }
        if self.options.core_canonicals.contains(url) {
            return false;
        }
        !self.options.ignored.contains(url) && !self.options.ignored.contains(&reference.raw)
    }
}

/// Accumulates references, skipping blanks
#[derive(Default)]
struct Collector(BTreeSet<CanonicalRef>);

impl Collector {
    fn add(&mut self, raw: Option<&str>, kind: ArtifactKind) {
        if let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) {
            self.0.insert(CanonicalRef::new(raw, kind));
        }
    }

    fn add_all<'a>(&mut self, raws: impl IntoIterator<Item = &'a String>, kind: ArtifactKind) {
        for raw in raws {
            self.add(Some(raw.as_str()), kind);
        }
    }
}

fn scan_profile(content: &ProfileContent, refs: &mut Collector) {
    for element in content.constrained_elements() {
        scan_element(element, refs);
    }
}

fn scan_element(element: &ElementDefinition, refs: &mut Collector) {
    for type_ref in &element.types {
        refs.add_all(&type_ref.profile, ArtifactKind::Profile);
        refs.add_all(&type_ref.target_profile, ArtifactKind::Profile);
    }

    if let Some(binding) = &element.binding {
        refs.add(binding.value_set.as_deref(), ArtifactKind::ValueSet);
        for additional in &binding.additional {
            refs.add(additional.value_set.as_deref(), ArtifactKind::ValueSet);
        }
        for ext in binding
            .extension
            .iter()
            .filter(|e| e.url == ADDITIONAL_BINDING_EXTENSION)
        {
            let value_set = ext.nested("valueSet").and_then(|e| e.canonical_value());
            refs.add(value_set, ArtifactKind::ValueSet);
        }
    }

    refs.add_all(&element.value_alternatives, ArtifactKind::Profile);
}

fn scan_value_set(content: &ValueSetContent, refs: &mut Collector) {
    let Some(compose) = &content.compose else {
        return;
    };

    for rule in compose.include.iter().chain(compose.exclude.iter()) {
        scan_concept_set(rule, refs);
    }
}

fn scan_concept_set(rule: &ConceptSet, refs: &mut Collector) {
    if let Some(system) = rule.system.as_deref() {
        match rule.version.as_deref().filter(|v| !v.is_empty()) {
            Some(version) => {
                let versioned = format!("{}|{}", system, version);
                refs.add(Some(versioned.as_str()), ArtifactKind::CodeSystem)
            }
            None => refs.add(Some(system), ArtifactKind::CodeSystem),
        }
    }
    refs.add_all(&rule.value_set, ArtifactKind::ValueSet);
}

fn scan_code_system(content: &CodeSystemContent, refs: &mut Collector) {
    refs.add(content.supplements.as_deref(), ArtifactKind::CodeSystem);
    refs.add(content.value_set.as_deref(), ArtifactKind::ValueSet);
}

fn scan_concept_map(content: &ConceptMapContent, refs: &mut Collector) {
    for scope in content.scopes() {
        refs.add(Some(scope), ArtifactKind::ValueSet);
    }

    for group in &content.group {
        refs.add(group.source.as_deref(), ArtifactKind::CodeSystem);
        refs.add(group.target.as_deref(), ArtifactKind::CodeSystem);

        for target in group.element.iter().flat_map(|e| e.target.iter()) {
            for dependency in target.depends_on.iter().chain(target.product.iter()) {
                refs.add(dependency.system.as_deref(), ArtifactKind::CodeSystem);
            }
        }

        if let Some(unmapped) = &group.unmapped {
            refs.add(unmapped.url.as_deref(), ArtifactKind::ConceptMap);
            refs.add(unmapped.other_map.as_deref(), ArtifactKind::ConceptMap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact(resource_type: &str, url: &str, content: ArtifactContent) -> Artifact {
        Artifact::new(resource_type, "test", content).with_url(url)
    }

    fn raws(refs: &BTreeSet<CanonicalRef>) -> Vec<&str> {
        refs.iter().map(|r| r.raw.as_str()).collect()
    }

    #[test]
    fn profile_references() {
        let content: ProfileContent = serde_json::from_value(json!({
            "differential": {"element": [
                {"path": "Observation"},
                {"path": "Observation.subject", "type": [
                    {"code": "Reference", "targetProfile": ["http://a.org/sd/patient"]}
                ]},
                {"path": "Observation.code", "binding": {
                    "valueSet": "http://a.org/vs/codes",
                    "additional": [{"valueSet": "http://a.org/vs/extra"}]
                }},
                {"path": "Observation.extension", "type": [
                    {"code": "Extension", "profile": ["http://a.org/sd/ext|1.0"]}
                ]},
                {"path": "Observation.value[x]", "valueAlternatives": ["http://a.org/sd/alt"]}
            ]}
        }))
        .unwrap();
        let sd = artifact("StructureDefinition", "http://a.org/sd/obs", ArtifactContent::Profile(content));

        let refs = CanonicalScanner::default().scan(&sd);

        assert_eq!(
            raws(&refs),
            vec![
                "http://a.org/sd/alt",
                "http://a.org/sd/ext|1.0",
                "http://a.org/sd/patient",
                "http://a.org/vs/codes",
                "http://a.org/vs/extra",
            ]
        );
        let vs = refs.iter().find(|r| r.raw == "http://a.org/vs/codes").unwrap();
        assert_eq!(vs.kind, ArtifactKind::ValueSet);
    }

    #[test]
    fn r4_additional_binding_extension() {
        let content: ProfileContent = serde_json::from_value(json!({
            "differential": {"element": [
                {"path": "Condition.code", "binding": {
                    "extension": [{
                        "url": ADDITIONAL_BINDING_EXTENSION,
                        "extension": [
                            {"url": "purpose", "valueCode": "preferred"},
                            {"url": "valueSet", "valueCanonical": "http://a.org/vs/r4-extra"}
                        ]
                    }]
                }}
            ]}
        }))
        .unwrap();
        let sd = artifact("StructureDefinition", "http://a.org/sd/cond", ArtifactContent::Profile(content));

        let refs = CanonicalScanner::default().scan(&sd);
        assert_eq!(raws(&refs), vec!["http://a.org/vs/r4-extra"]);
    }

    #[test]
    fn core_types_dropped_unless_kept() {
        let content: ProfileContent = serde_json::from_value(json!({
            "differential": {"element": [
                {"path": "Observation.subject", "type": [
                    {"code": "Reference", "targetProfile": [
                        "http://hl7.org/fhir/StructureDefinition/Patient",
                        "http://a.org/sd/patient"
                    ]}
                ]}
            ]}
        }))
        .unwrap();
        let sd = artifact("StructureDefinition", "http://a.org/sd/obs", ArtifactContent::Profile(content));

        let refs = CanonicalScanner::default().scan(&sd);
        assert_eq!(raws(&refs), vec!["http://a.org/sd/patient"]);

        let keep = CanonicalScanner::new(ScanOptions {
            keep_core_types: true,
            ..Default::default()
        });
        assert_eq!(keep.scan(&sd).len(), 2);
    }

    #[test]
    fn core_package_canonicals_dropped() {
        let content: ProfileContent = serde_json::from_value(json!({
            "differential": {"element": [
                {"path": "Patient.extension", "type": [{"code": "Extension", "profile": [
                    "http://hl7.org/fhir/StructureDefinition/patient-birthPlace"
                ]}]}
            ]}
        }))
        .unwrap();
        let sd = artifact("StructureDefinition", "http://a.org/sd/pat", ArtifactContent::Profile(content));

        assert_eq!(CanonicalScanner::default().scan(&sd).len(), 1);

        let mut options = ScanOptions::default();
        options
            .core_canonicals
            .insert("http://hl7.org/fhir/StructureDefinition/patient-birthPlace".to_string());
        assert!(CanonicalScanner::new(options).scan(&sd).is_empty());
    }

    #[test]
    fn value_set_include_and_exclude() {
        let content: ValueSetContent = serde_json::from_value(json!({
            "compose": {
                "include": [
                    {"system": "http://a.org/cs/one", "version": "2.1"},
                    {"valueSet": ["http://a.org/vs/base"]}
                ],
                "exclude": [{"system": "http://a.org/cs/two"}]
            }
        }))
        .unwrap();
        let vs = artifact("ValueSet", "http://a.org/vs/mine", ArtifactContent::ValueSet(content));

        let refs = CanonicalScanner::default().scan(&vs);
        assert_eq!(
            raws(&refs),
            vec!["http://a.org/cs/one|2.1", "http://a.org/cs/two", "http://a.org/vs/base"]
        );
    }

    #[test]
    fn code_system_supplements_and_companion() {
        let content = CodeSystemContent {
            supplements: Some("http://a.org/cs/base".to_string()),
            value_set: Some("http://a.org/vs/all".to_string()),
        };
        let cs = artifact("CodeSystem", "http://a.org/cs/sup", ArtifactContent::CodeSystem(content));

        let refs = CanonicalScanner::default().scan(&cs);
        assert_eq!(raws(&refs), vec!["http://a.org/cs/base", "http://a.org/vs/all"]);
    }

    #[test]
    fn concept_map_references() {
        let content: ConceptMapContent = serde_json::from_value(json!({
            "sourceScopeUri": "http://a.org/vs/src",
            "targetScopeUri": "http://a.org/vs/tgt",
            "group": [{
                "source": "http://a.org/cs/src",
                "target": "http://a.org/cs/tgt",
                "element": [{"target": [{
                    "dependsOn": [{"system": "http://a.org/cs/dep"}],
                    "product": [{"system": "http://a.org/cs/prod"}]
                }]}],
                "unmapped": {"mode": "other-map", "url": "http://a.org/cm/fallback"}
            }]
        }))
        .unwrap();
        let cm = artifact("ConceptMap", "http://a.org/cm/map", ArtifactContent::ConceptMap(content));

        let refs = CanonicalScanner::default().scan(&cm);
        assert_eq!(
            raws(&refs),
            vec![
                "http://a.org/cm/fallback",
                "http://a.org/cs/dep",
                "http://a.org/cs/prod",
                "http://a.org/cs/src",
                "http://a.org/cs/tgt",
                "http://a.org/vs/src",
                "http://a.org/vs/tgt",
            ]
        );
    }

    #[test]
    fn self_reference_and_blanks_skipped() {
        let content = CodeSystemContent {
            supplements: Some("  ".to_string()),
            value_set: Some("http://a.org/cs/self".to_string()),
        };
        let cs = artifact("CodeSystem", "http://a.org/cs/self", ArtifactContent::CodeSystem(content));

        assert!(CanonicalScanner::default().scan(&cs).is_empty());
    }

    #[test]
    fn other_kinds_have_no_references() {
        let patient = Artifact::new("Patient", "example", ArtifactContent::Other);
        assert!(CanonicalScanner::default().scan(&patient).is_empty());
    }

    #[test]
    fn ignored_canonicals_dropped() {
        let content = CodeSystemContent {
            supplements: Some("http://a.org/cs/base".to_string()),
            value_set: None,
        };
        let cs = artifact("CodeSystem", "http://a.org/cs/sup", ArtifactContent::CodeSystem(content));

        let mut options = ScanOptions::default();
        options.ignored.insert("http://a.org/cs/base".to_string());
        assert!(CanonicalScanner::new(options).scan(&cs).is_empty());
    }
}
