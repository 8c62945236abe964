//! Built-in resource catalogues binding the engine to concrete API
//! surfaces.

mod backend_service;
mod dns_policy;
mod node_template;

use crate::codec::CodecRegistry;
use crate::error::EngineError;
use crate::spec::{ResourceSpec, SpecError};

pub use backend_service::backend_service;
pub use dns_policy::dns_policy;
pub use node_template::node_template;

/// A resource spec paired with the codec registry its fields need.
#[derive(Clone, Debug)]
pub struct ResourceDefinition {
    spec: ResourceSpec,
    codecs: CodecRegistry,
}

impl ResourceDefinition {
    /// Pairs a spec with its codecs.
    #[must_use]
    pub const fn new(spec: ResourceSpec, codecs: CodecRegistry) -> Self {
        Self { spec, codecs }
    }

    /// The resource spec.
    #[must_use]
    pub const fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    /// The codec registry.
    #[must_use]
    pub const fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Splits the definition into its parts for applier construction.
    #[must_use]
    pub fn into_parts(self) -> (ResourceSpec, CodecRegistry) {
        (self.spec, self.codecs)
    }
}

/// CLI names of the built-in resource types.
pub const RESOURCE_TYPES: &[&str] = &["dns-policy", "backend-service", "node-template"];

/// Looks up a built-in resource definition by its CLI name.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] for unknown type names or a spec
/// that fails its structural invariants.
pub fn by_name(name: &str) -> Result<ResourceDefinition, EngineError> {
    let definition = match name {
        "dns-policy" => dns_policy(),
        "backend-service" => backend_service(),
        "node-template" => node_template(),
        other => {
            return Err(EngineError::Validation(format!(
                "unknown resource type '{other}' (expected one of: {})",
                RESOURCE_TYPES.join(", ")
            )));
        }
    };
    definition.map_err(|err| EngineError::Validation(err.to_string()))
}

/// Result of building a catalogue definition.
pub type DefinitionResult = Result<ResourceDefinition, SpecError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Mutability;

    #[test]
    fn all_built_in_catalogues_build() {
        for name in RESOURCE_TYPES {
            by_name(name).unwrap_or_else(|err| panic!("catalogue {name} should build: {err}"));
        }
    }

    #[test]
    fn unknown_resource_types_are_rejected() {
        let result = by_name("widget");
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn dns_policy_declares_a_detach_field() {
        let definition =
            dns_policy().unwrap_or_else(|err| panic!("dns_policy should build: {err}"));
        let detach = definition
            .spec()
            .detach_field()
            .unwrap_or_else(|| panic!("dns_policy must detach networks before delete"));
        assert_eq!(detach.name(), "networks");
    }

    #[test]
    fn node_template_user_fields_all_force_replacement() {
        let definition =
            node_template().unwrap_or_else(|err| panic!("node_template should build: {err}"));
        for field in definition.spec().fields() {
            assert_ne!(
                field.mutability(),
                Mutability::Mutable,
                "node templates cannot be patched, but '{}' is mutable",
                field.name()
            );
        }
    }

    #[test]
    fn backend_service_uses_the_vendor_wire_name_for_cdn() {
        let definition =
            backend_service().unwrap_or_else(|err| panic!("backend_service should build: {err}"));
        let field = definition
            .spec()
            .field("enable_cdn")
            .unwrap_or_else(|| panic!("enable_cdn should be declared"));
        assert_eq!(field.wire_name(), "enableCDN");
    }
}
