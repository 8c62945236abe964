//! Node template resource: regional templates for sole-tenant nodes.
//!
//! The remote API offers no update verb for node templates, so every user
//! field is immutable and any drift converges through replacement.

use std::sync::Arc;

use crate::codec::{CodecRegistry, RawObjectCodec};
use crate::spec::{FieldDef, ResourceSpec};
use crate::value::FieldKind;

use super::{DefinitionResult, ResourceDefinition};

/// Builds the `node_template` resource definition.
///
/// # Errors
///
/// Returns [`crate::spec::SpecError`] if the spec violates a structural
/// invariant; this indicates a programming error in the catalogue.
pub fn node_template() -> DefinitionResult {
    let spec = ResourceSpec::builder("node_template")
        .create_path("projects/{{project}}/regions/{{region}}/nodeTemplates")
        .resource_path("projects/{{project}}/regions/{{region}}/nodeTemplates/{{name}}")
        .identity(["project", "region", "name"])
        .import_pattern(
            "projects/(?P<project>[^/]+)/regions/(?P<region>[^/]+)/nodeTemplates/(?P<name>[^/]+)",
        )
        .import_pattern("(?P<project>[^/]+)/(?P<region>[^/]+)/(?P<name>[^/]+)")
        .import_pattern("(?P<region>[^/]+)/(?P<name>[^/]+)")
        .import_pattern("(?P<name>[^/]+)")
        .field(FieldDef::new("name", FieldKind::Str).required().immutable())
        .field(FieldDef::new("description", FieldKind::Str).immutable())
        .field(FieldDef::new("node_type", FieldKind::Str).immutable())
        .field(FieldDef::new("node_type_flexibility", FieldKind::Object).immutable())
        .field(FieldDef::new("node_affinity_labels", FieldKind::Object).immutable())
        .field(FieldDef::new("region", FieldKind::Str).immutable())
        .field(FieldDef::new("project", FieldKind::Str).immutable())
        .field(FieldDef::new("creation_timestamp", FieldKind::Str).computed())
        .build()?;

    // Affinity label keys are user data and must not be case-converted.
    let mut codecs = CodecRegistry::new();
    codecs.register("node_affinity_labels", Arc::new(RawObjectCodec));

    Ok(ResourceDefinition::new(spec, codecs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldValue;
    use std::collections::BTreeMap;

    #[test]
    fn affinity_label_keys_survive_encoding() {
        let definition = node_template().unwrap_or_else(|err| panic!("build: {err}"));
        let field = definition
            .spec()
            .field("node_affinity_labels")
            .unwrap_or_else(|| panic!("labels should be declared"));

        let mut labels = BTreeMap::new();
        labels.insert(String::from("workload_class"), FieldValue::from("batch"));
        let encoded = definition
            .codecs()
            .encode_field(field, &FieldValue::Object(labels))
            .unwrap_or_else(|err| panic!("encode: {err}"));
        assert_eq!(encoded, serde_json::json!({"workload_class": "batch"}));
    }

    #[test]
    fn import_accepts_regional_ids() {
        let definition = node_template().unwrap_or_else(|err| panic!("build: {err}"));
        let vars = crate::import::parse_import_id(
            definition.spec(),
            "projects/p/regions/us-central1/nodeTemplates/tmpl",
        )
        .unwrap_or_else(|err| panic!("parse: {err}"));
        assert_eq!(vars.get("region").map(String::as_str), Some("us-central1"));
    }
}
