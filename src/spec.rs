//! Resource specifications: field definitions, mutability, and API paths.

use thiserror::Error;

use crate::codec::snake_to_camel;
use crate::value::FieldKind;

/// Mutability class of a field, driving diff and apply behaviour.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mutability {
    /// Changing the field requires deleting and recreating the resource.
    Immutable,
    /// The field can be patched in place.
    Mutable,
    /// The server owns the value; callers may not set it.
    Computed,
}

/// Definition of a single declarative field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldDef {
    name: String,
    wire_name: String,
    kind: FieldKind,
    mutability: Mutability,
    required: bool,
    send_zero: bool,
    update_path: Option<String>,
}

impl FieldDef {
    /// Creates a mutable, optional field with the wire name derived from the
    /// user-facing name (snake_case to camelCase).
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        let wire_name = snake_to_camel(&name);
        Self {
            name,
            wire_name,
            kind,
            mutability: Mutability::Mutable,
            required: false,
            send_zero: false,
            update_path: None,
        }
    }

    /// Overrides the wire name when it does not follow the camelCase rule.
    #[must_use]
    pub fn wire(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = wire_name.into();
        self
    }

    /// Marks the field as forcing replacement when changed.
    #[must_use]
    pub const fn immutable(mut self) -> Self {
        self.mutability = Mutability::Immutable;
        self
    }

    /// Marks the field as server-computed.
    #[must_use]
    pub const fn computed(mut self) -> Self {
        self.mutability = Mutability::Computed;
        self
    }

    /// Marks the field as required on create.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Encodes the zero value instead of omitting it. The original API
    /// always transmits booleans, so flag-like fields opt in here; the
    /// default matches the existence-check behaviour used everywhere else.
    #[must_use]
    pub const fn send_zero(mut self) -> Self {
        self.send_zero = true;
        self
    }

    /// Routes updates of this field through a dedicated path template
    /// instead of the spec's resource path.
    #[must_use]
    pub fn update_path(mut self, template: impl Into<String>) -> Self {
        self.update_path = Some(template.into());
        self
    }

    /// User-facing field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire (JSON) field name.
    #[must_use]
    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    /// Semantic type of the field.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Mutability class of the field.
    #[must_use]
    pub const fn mutability(&self) -> Mutability {
        self.mutability
    }

    /// Whether the field must be present in desired state on create.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Whether the zero value is transmitted rather than omitted.
    #[must_use]
    pub const fn sends_zero(&self) -> bool {
        self.send_zero
    }

    /// Dedicated update path template, when one is declared.
    #[must_use]
    pub fn dedicated_update_path(&self) -> Option<&str> {
        self.update_path.as_deref()
    }
}

/// Ordered set of field definitions plus the API surface they bind to.
#[derive(Clone, Debug)]
pub struct ResourceSpec {
    type_name: String,
    create_path: String,
    resource_path: String,
    identity: Vec<String>,
    import_patterns: Vec<String>,
    detach_field: Option<String>,
    fields: Vec<FieldDef>,
}

impl ResourceSpec {
    /// Starts a builder for a spec describing `type_name` resources.
    #[must_use]
    pub fn builder(type_name: impl Into<String>) -> ResourceSpecBuilder {
        ResourceSpecBuilder::new(type_name)
    }

    /// Resource type name (for example `dns_policy`).
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Path template used for POST (create) calls.
    #[must_use]
    pub fn create_path(&self) -> &str {
        &self.create_path
    }

    /// Path template addressing a single resource (GET/PATCH/DELETE).
    #[must_use]
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    /// Names of the identity variables appearing in path templates.
    #[must_use]
    pub fn identity(&self) -> &[String] {
        &self.identity
    }

    /// Ordered import id patterns, most specific first.
    #[must_use]
    pub fn import_patterns(&self) -> &[String] {
        &self.import_patterns
    }

    /// Field whose references must be cleared before deletion, if any.
    #[must_use]
    pub fn detach_field(&self) -> Option<&FieldDef> {
        self.detach_field
            .as_deref()
            .and_then(|name| self.field(name))
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Looks up a field definition by user-facing name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name() == name)
    }
}

/// Builder for [`ResourceSpec`] enforcing structural invariants at build
/// time.
#[derive(Clone, Debug, Default)]
pub struct ResourceSpecBuilder {
    type_name: String,
    create_path: String,
    resource_path: String,
    identity: Vec<String>,
    import_patterns: Vec<String>,
    detach_field: Option<String>,
    fields: Vec<FieldDef>,
}

impl ResourceSpecBuilder {
    fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Sets the collection path template used for creation.
    #[must_use]
    pub fn create_path(mut self, template: impl Into<String>) -> Self {
        self.create_path = template.into();
        self
    }

    /// Sets the per-resource path template.
    #[must_use]
    pub fn resource_path(mut self, template: impl Into<String>) -> Self {
        self.resource_path = template.into();
        self
    }

    /// Declares the identity variables substituted into path templates.
    #[must_use]
    pub fn identity<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identity = names.into_iter().map(Into::into).collect();
        self
    }

    /// Appends an import id pattern; call in most-specific-first order.
    #[must_use]
    pub fn import_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.import_patterns.push(pattern.into());
        self
    }

    /// Declares the field that must be detached before deletion.
    #[must_use]
    pub fn detach_field(mut self, name: impl Into<String>) -> Self {
        self.detach_field = Some(name.into());
        self
    }

    /// Appends a field definition.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Builds the spec, validating its structural invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] when a field name is duplicated, a path template
    /// is missing, or the detach/identity declarations reference unknown
    /// fields.
    pub fn build(self) -> Result<ResourceSpec, SpecError> {
        if self.create_path.is_empty() {
            return Err(SpecError::MissingPath {
                which: "create_path",
            });
        }
        if self.resource_path.is_empty() {
            return Err(SpecError::MissingPath {
                which: "resource_path",
            });
        }

        let mut seen = std::collections::BTreeSet::new();
        for field in &self.fields {
            if !seen.insert(field.name().to_owned()) {
                return Err(SpecError::DuplicateField {
                    name: field.name().to_owned(),
                });
            }
        }

        if let Some(name) = &self.detach_field
            && !self.fields.iter().any(|field| field.name() == name)
        {
            return Err(SpecError::UnknownField { name: name.clone() });
        }
        for name in &self.identity {
            if !self.fields.iter().any(|field| field.name() == name) {
                return Err(SpecError::UnknownField { name: name.clone() });
            }
        }

        Ok(ResourceSpec {
            type_name: self.type_name,
            create_path: self.create_path,
            resource_path: self.resource_path,
            identity: self.identity,
            import_patterns: self.import_patterns,
            detach_field: self.detach_field,
            fields: self.fields,
        })
    }
}

/// Errors raised while constructing a [`ResourceSpec`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SpecError {
    /// Raised when two fields share a user-facing name.
    #[error("duplicate field name: {name}")]
    DuplicateField {
        /// The duplicated field name.
        name: String,
    },
    /// Raised when a required path template is missing.
    #[error("spec is missing its {which} template")]
    MissingPath {
        /// Which template was absent.
        which: &'static str,
    },
    /// Raised when a declaration references a field that does not exist.
    #[error("spec references unknown field: {name}")]
    UnknownField {
        /// The unresolved field name.
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_builder() -> ResourceSpecBuilder {
        ResourceSpec::builder("widget")
            .create_path("projects/{{project}}/widgets")
            .resource_path("projects/{{project}}/widgets/{{name}}")
    }

    #[test]
    fn wire_names_default_to_camel_case() {
        let field = FieldDef::new("enable_inbound_forwarding", FieldKind::Bool);
        assert_eq!(field.wire_name(), "enableInboundForwarding");
    }

    #[test]
    fn wire_name_override_is_kept() {
        let field = FieldDef::new("ipv4_address", FieldKind::Str).wire("ipv4Address");
        assert_eq!(field.wire_name(), "ipv4Address");
    }

    #[test]
    fn duplicate_field_names_are_rejected() {
        let result = minimal_builder()
            .field(FieldDef::new("name", FieldKind::Str))
            .field(FieldDef::new("name", FieldKind::Str))
            .build();
        assert_eq!(
            result.err(),
            Some(SpecError::DuplicateField {
                name: String::from("name")
            })
        );
    }

    #[test]
    fn detach_field_must_exist() {
        let result = minimal_builder()
            .field(FieldDef::new("name", FieldKind::Str))
            .detach_field("networks")
            .build();
        assert_eq!(
            result.err(),
            Some(SpecError::UnknownField {
                name: String::from("networks")
            })
        );
    }

    #[test]
    fn missing_paths_are_rejected() {
        let result = ResourceSpec::builder("widget")
            .resource_path("widgets/{{name}}")
            .build();
        assert_eq!(
            result.err(),
            Some(SpecError::MissingPath {
                which: "create_path"
            })
        );
    }

    #[test]
    fn fields_keep_declaration_order() {
        let spec = minimal_builder()
            .field(FieldDef::new("name", FieldKind::Str).required().immutable())
            .field(FieldDef::new("description", FieldKind::Str))
            .field(FieldDef::new("project", FieldKind::Str).immutable())
            .identity(["project", "name"])
            .build()
            .unwrap_or_else(|err| panic!("spec should build: {err}"));
        let names: Vec<_> = spec.fields().iter().map(FieldDef::name).collect();
        assert_eq!(names, vec!["name", "description", "project"]);
    }
}
