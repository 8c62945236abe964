//! DNS policy resource: response policies attached to VPC networks.

use crate::codec::CodecRegistry;
use crate::spec::{FieldDef, ResourceSpec};
use crate::value::FieldKind;

use super::{DefinitionResult, ResourceDefinition};

/// Builds the `dns_policy` resource definition.
///
/// Networks referencing the policy must be detached before the policy can
/// be deleted, so `networks` doubles as the detach field.
///
/// # Errors
///
/// Returns [`crate::spec::SpecError`] if the spec violates a structural
/// invariant; this indicates a programming error in the catalogue.
pub fn dns_policy() -> DefinitionResult {
    let spec = ResourceSpec::builder("dns_policy")
        .create_path("projects/{{project}}/policies")
        .resource_path("projects/{{project}}/policies/{{name}}")
        .identity(["project", "name"])
        .import_pattern("projects/(?P<project>[^/]+)/policies/(?P<name>[^/]+)")
        .import_pattern("(?P<project>[^/]+)/(?P<name>[^/]+)")
        .import_pattern("(?P<name>[^/]+)")
        .detach_field("networks")
        .field(FieldDef::new("name", FieldKind::Str).required().immutable())
        .field(FieldDef::new("alternative_name_server_config", FieldKind::Object))
        .field(FieldDef::new("description", FieldKind::Str))
        .field(FieldDef::new("enable_inbound_forwarding", FieldKind::Bool).send_zero())
        .field(FieldDef::new("enable_logging", FieldKind::Bool).send_zero())
        .field(FieldDef::new("networks", FieldKind::Set))
        .field(FieldDef::new("project", FieldKind::Str).immutable())
        .build()?;

    Ok(ResourceDefinition::new(spec, CodecRegistry::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Mutability;

    #[test]
    fn name_and_project_force_replacement() {
        let definition = dns_policy().unwrap_or_else(|err| panic!("build: {err}"));
        for field_name in ["name", "project"] {
            let field = definition
                .spec()
                .field(field_name)
                .unwrap_or_else(|| panic!("{field_name} should be declared"));
            assert_eq!(field.mutability(), Mutability::Immutable);
        }
    }

    #[test]
    fn booleans_always_transmit() {
        let definition = dns_policy().unwrap_or_else(|err| panic!("build: {err}"));
        for field_name in ["enable_inbound_forwarding", "enable_logging"] {
            let field = definition
                .spec()
                .field(field_name)
                .unwrap_or_else(|| panic!("{field_name} should be declared"));
            assert!(field.sends_zero(), "{field_name} must send false explicitly");
        }
    }

    #[test]
    fn nested_config_maps_to_camel_case() {
        let definition = dns_policy().unwrap_or_else(|err| panic!("build: {err}"));
        let field = definition
            .spec()
            .field("alternative_name_server_config")
            .unwrap_or_else(|| panic!("field should be declared"));
        assert_eq!(field.wire_name(), "alternativeNameServerConfig");
    }
}
