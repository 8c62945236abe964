//! Backend service resource: global load-balancer backends.

use crate::codec::CodecRegistry;
use crate::spec::{FieldDef, ResourceSpec};
use crate::value::FieldKind;

use super::{DefinitionResult, ResourceDefinition};

/// Builds the `backend_service` resource definition.
///
/// # Errors
///
/// Returns [`crate::spec::SpecError`] if the spec violates a structural
/// invariant; this indicates a programming error in the catalogue.
pub fn backend_service() -> DefinitionResult {
    let spec = ResourceSpec::builder("backend_service")
        .create_path("projects/{{project}}/global/backendServices")
        .resource_path("projects/{{project}}/global/backendServices/{{name}}")
        .identity(["project", "name"])
        .import_pattern("projects/(?P<project>[^/]+)/global/backendServices/(?P<name>[^/]+)")
        .import_pattern("(?P<project>[^/]+)/(?P<name>[^/]+)")
        .import_pattern("(?P<name>[^/]+)")
        .field(FieldDef::new("name", FieldKind::Str).required().immutable())
        .field(FieldDef::new("description", FieldKind::Str))
        .field(FieldDef::new("protocol", FieldKind::Str))
        .field(FieldDef::new("port_name", FieldKind::Str))
        .field(FieldDef::new("timeout_sec", FieldKind::Int))
        .field(FieldDef::new("connection_draining_timeout_sec", FieldKind::Int))
        .field(FieldDef::new("enable_cdn", FieldKind::Bool).wire("enableCDN").send_zero())
        .field(FieldDef::new("session_affinity", FieldKind::Str))
        .field(FieldDef::new("health_checks", FieldKind::Set).required())
        .field(FieldDef::new("backends", FieldKind::Set))
        .field(FieldDef::new("project", FieldKind::Str).immutable())
        .field(FieldDef::new("fingerprint", FieldKind::Str).computed())
        .build()?;

    Ok(ResourceDefinition::new(spec, CodecRegistry::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Mutability;

    #[test]
    fn fingerprint_is_server_owned() {
        let definition = backend_service().unwrap_or_else(|err| panic!("build: {err}"));
        let field = definition
            .spec()
            .field("fingerprint")
            .unwrap_or_else(|| panic!("fingerprint should be declared"));
        assert_eq!(field.mutability(), Mutability::Computed);
    }

    #[test]
    fn health_checks_are_required() {
        let definition = backend_service().unwrap_or_else(|err| panic!("build: {err}"));
        let field = definition
            .spec()
            .field("health_checks")
            .unwrap_or_else(|| panic!("health_checks should be declared"));
        assert!(field.is_required());
    }
}
