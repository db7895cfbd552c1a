//! Base specification knowledge
//!
//! References to the core resource and datatype definitions are always
//! resolvable on any FHIR server, so the scanner drops them.

/// Prefix of core StructureDefinition canonicals
pub const CORE_STRUCTURE_PREFIX: &str = "http://hl7.org/fhir/StructureDefinition/";

/// Core resource and datatype names (R4 and R5)
pub const CORE_TYPES: &[&str] = &[
    // Primitive types
    "base64Binary", "boolean", "canonical", "code", "date", "dateTime", "decimal", "id",
    "instant", "integer", "integer64", "markdown", "oid", "positiveInt", "string", "time",
    "unsignedInt", "uri", "url", "uuid", "xhtml",
    // General purpose and special datatypes
    "Address", "Age", "Annotation", "Attachment", "Availability", "BackboneElement",
    "BackboneType", "Base", "CodeableConcept", "CodeableReference", "Coding", "ContactDetail",
    "ContactPoint", "Contributor", "Count", "DataRequirement", "DataType", "Distance",
    "Dosage", "Duration", "Element", "ElementDefinition", "Expression", "ExtendedContactDetail",
    "Extension", "HumanName", "Identifier", "MarketingStatus", "Meta", "MonetaryComponent",
    "Money", "MoneyQuantity", "Narrative", "ParameterDefinition", "Period", "Population",
    "PrimitiveType", "ProdCharacteristic", "ProductShelfLife", "Quantity", "Range", "Ratio",
    "RatioRange", "Reference", "RelatedArtifact", "SampledData", "Signature", "SimpleQuantity",
    "SubstanceAmount", "Timing", "TriggerDefinition", "UsageContext", "VirtualServiceDetail",
    // Resources
    "Account", "ActivityDefinition", "ActorDefinition", "AdministrableProductDefinition",
    "AdverseEvent", "AllergyIntolerance", "Appointment", "AppointmentResponse",
    "ArtifactAssessment", "AuditEvent", "Basic", "Binary", "BiologicallyDerivedProduct",
    "BiologicallyDerivedProductDispense", "BodyStructure", "Bundle", "CanonicalResource",
    "CapabilityStatement", "CarePlan", "CareTeam", "CatalogEntry", "ChargeItem",
    "ChargeItemDefinition", "Citation", "Claim", "ClaimResponse", "ClinicalImpression",
    "ClinicalUseDefinition", "CodeSystem", "Communication", "CommunicationRequest",
    "CompartmentDefinition", "Composition", "ConceptMap", "Condition", "ConditionDefinition",
    "Consent", "Contract", "Coverage", "CoverageEligibilityRequest",
    "CoverageEligibilityResponse", "DetectedIssue", "Device", "DeviceAssociation",
    "DeviceDefinition", "DeviceDispense", "DeviceMetric", "DeviceRequest", "DeviceUsage",
    "DeviceUseStatement", "DiagnosticReport", "DocumentManifest", "DocumentReference",
    "DomainResource", "EffectEvidenceSynthesis", "Encounter", "EncounterHistory", "Endpoint",
    "EnrollmentRequest", "EnrollmentResponse", "EpisodeOfCare", "EventDefinition", "Evidence",
    "EvidenceReport", "EvidenceVariable", "ExampleScenario", "ExplanationOfBenefit",
    "FamilyMemberHistory", "Flag", "FormularyItem", "GenomicStudy", "Goal",
    "GraphDefinition", "Group", "GuidanceResponse", "HealthcareService", "ImagingSelection",
    "ImagingStudy", "Immunization", "ImmunizationEvaluation", "ImmunizationRecommendation",
    "ImplementationGuide", "Ingredient", "InsurancePlan", "InventoryItem", "InventoryReport",
    "Invoice", "Library", "Linkage", "List", "Location", "ManufacturedItemDefinition",
    "Measure", "MeasureReport", "Media", "Medication", "MedicationAdministration",
    "MedicationDispense", "MedicationKnowledge", "MedicationRequest", "MedicationStatement",
    "MedicinalProduct", "MedicinalProductDefinition", "MessageDefinition", "MessageHeader",
    "MetadataResource", "MolecularSequence", "NamingSystem", "NutritionIntake",
    "NutritionOrder", "NutritionProduct", "Observation", "ObservationDefinition",
    "OperationDefinition", "OperationOutcome", "Organization", "OrganizationAffiliation",
    "PackagedProductDefinition", "Parameters", "Patient", "PaymentNotice",
    "PaymentReconciliation", "Permission", "Person", "PlanDefinition", "Practitioner",
    "PractitionerRole", "Procedure", "Provenance", "Questionnaire", "QuestionnaireResponse",
    "RegulatedAuthorization", "RelatedPerson", "RequestGroup", "RequestOrchestration",
    "Requirements", "ResearchDefinition", "ResearchElementDefinition", "ResearchStudy",
    "ResearchSubject", "Resource", "RiskAssessment", "RiskEvidenceSynthesis", "Schedule",
    "SearchParameter", "ServiceRequest", "Slot", "Specimen", "SpecimenDefinition",
    "StructureDefinition", "StructureMap", "Subscription", "SubscriptionStatus",
    "SubscriptionTopic", "Substance", "SubstanceDefinition", "SubstanceNucleicAcid",
    "SubstancePolymer", "SubstanceProtein", "SubstanceReferenceInformation",
    "SubstanceSourceMaterial", "SupplyDelivery", "SupplyRequest", "Task",
    "TerminologyCapabilities", "TestPlan", "TestReport", "TestScript", "Transport",
    "ValueSet", "VerificationResult", "VisionPrescription",
];

/// Returns true if `url` names a core resource or datatype definition
///
/// A trailing `|version` is ignored.
pub fn is_core_type_uri(url: &str) -> bool {
    let url = super::canonical::strip_version(url);
    match url.strip_prefix(CORE_STRUCTURE_PREFIX) {
        Some(name) => CORE_TYPES.contains(&name),
        None => false,
    }
}

/// Returns true if a package id names a base specification package
/// (`hl7.fhir.r4.core`, `hl7.fhir.r5.core`, ...)
pub fn is_core_package(package_id: &str) -> bool {
    package_id
        .strip_prefix("hl7.fhir.r")
        .and_then(|rest| rest.split_once('.'))
        .map(|(release, tail)| !release.is_empty() && tail == "core")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_types_recognised() {
        assert!(is_core_type_uri("http://hl7.org/fhir/StructureDefinition/Patient"));
        assert!(is_core_type_uri("http://hl7.org/fhir/StructureDefinition/string"));
        assert!(is_core_type_uri("http://hl7.org/fhir/StructureDefinition/Reference|4.0.1"));
    }

    #[test]
    fn core_extensions_are_not_core_types() {
        assert!(!is_core_type_uri(
            "http://hl7.org/fhir/StructureDefinition/patient-birthPlace"
        ));
        assert!(!is_core_type_uri("http://example.org/StructureDefinition/Patient"));
    }

    #[test]
    fn core_package_ids() {
        assert!(is_core_package("hl7.fhir.r4.core"));
        assert!(is_core_package("hl7.fhir.r5.core"));
        assert!(is_core_package("hl7.fhir.r4b.core"));
        assert!(!is_core_package("hl7.fhir.r4.expansions"));
        assert!(!is_core_package("hl7.fhir.us.core"));
    }
}
