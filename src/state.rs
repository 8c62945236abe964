//! Desired and remote state representations plus the resource handle that
//! correlates them across operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::spec::ResourceSpec;
use crate::value::{FieldKind, FieldValue};

/// Caller-declared target configuration for a resource.
///
/// Only fields explicitly set by the caller are present; absence is distinct
/// from a zero value. A field present with its zero value means "explicitly
/// cleared".
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DesiredState {
    values: BTreeMap<String, FieldValue>,
}

impl DesiredState {
    /// Creates an empty desired state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Sets a field value, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Returns the value of an explicitly set field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Reports whether the caller explicitly set a field.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterates explicitly set fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of explicitly set fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Reports whether no field was set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Builds a desired state from a user-supplied JSON document, validating
    /// each attribute against the spec. A JSON `null` marks a field as
    /// explicitly cleared (its zero value).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for unknown attributes or values of
    /// the wrong shape.
    pub fn from_json(spec: &ResourceSpec, document: &serde_json::Value) -> Result<Self, EngineError> {
        let serde_json::Value::Object(entries) = document else {
            return Err(EngineError::Validation(String::from(
                "desired state document must be a JSON object",
            )));
        };

        let mut state = Self::new();
        for (name, raw) in entries {
            let field = spec.field(name).ok_or_else(|| {
                EngineError::Validation(format!(
                    "unknown attribute '{name}' for resource type {}",
                    spec.type_name()
                ))
            })?;
            let value = if raw.is_null() {
                FieldValue::zero(field.kind())
            } else {
                user_value_of_kind(field.kind(), raw).ok_or_else(|| {
                    EngineError::Validation(format!(
                        "attribute '{name}' must be a {}",
                        field.kind().name()
                    ))
                })?
            };
            state.set(name.clone(), value);
        }
        Ok(state)
    }
}

fn user_value_of_kind(kind: FieldKind, raw: &serde_json::Value) -> Option<FieldValue> {
    match (kind, raw) {
        (FieldKind::Str, serde_json::Value::String(s)) => Some(FieldValue::Str(s.clone())),
        (FieldKind::Bool, serde_json::Value::Bool(b)) => Some(FieldValue::Bool(*b)),
        (FieldKind::Int, serde_json::Value::Number(n)) => n.as_i64().map(FieldValue::Int),
        (FieldKind::Object, serde_json::Value::Object(_)) | (FieldKind::Set, serde_json::Value::Array(_)) => {
            serde_json::from_value(raw.clone()).ok()
        }
        _ => None,
    }
}

/// Server-side representation of a resource, fully populated after a fetch.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RemoteState {
    values: BTreeMap<String, FieldValue>,
}

impl RemoteState {
    /// Creates an empty remote state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Records a decoded field value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Returns the decoded value of a field, when the server reported one.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Iterates decoded fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Reports whether the fetch produced no recognised fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Opaque identity correlating desired and remote state across operations.
///
/// Created by the applier's create path (or recovered via import), immutable
/// thereafter, and destroyed on successful deletion. The identity variables
/// are substituted into the spec's path templates.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResourceHandle {
    type_name: String,
    identity: BTreeMap<String, String>,
}

impl ResourceHandle {
    /// Creates a handle for a resource of `type_name` with the given identity
    /// variables.
    #[must_use]
    pub const fn new(type_name: String, identity: BTreeMap<String, String>) -> Self {
        Self {
            type_name,
            identity,
        }
    }

    /// Resource type this handle belongs to.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns an identity variable value.
    #[must_use]
    pub fn var(&self, name: &str) -> Option<&str> {
        self.identity.get(name).map(String::as_str)
    }

    /// All identity variables, for path substitution.
    #[must_use]
    pub const fn vars(&self) -> &BTreeMap<String, String> {
        &self.identity
    }

    /// Stable display form, such as `dns_policy[project=p, name=n]`.
    #[must_use]
    pub fn describe(&self) -> String {
        let vars: Vec<String> = self
            .identity
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        format!("{}[{}]", self.type_name, vars.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{FieldDef, ResourceSpec};

    fn spec() -> ResourceSpec {
        ResourceSpec::builder("widget")
            .create_path("projects/{{project}}/widgets")
            .resource_path("projects/{{project}}/widgets/{{name}}")
            .identity(["project", "name"])
            .field(FieldDef::new("name", FieldKind::Str).required().immutable())
            .field(FieldDef::new("project", FieldKind::Str).immutable())
            .field(FieldDef::new("timeout_sec", FieldKind::Int))
            .field(FieldDef::new("enable_logging", FieldKind::Bool).send_zero())
            .field(FieldDef::new("networks", FieldKind::Set))
            .build()
            .unwrap_or_else(|err| panic!("spec should build: {err}"))
    }

    #[test]
    fn from_json_accepts_known_fields() {
        let document = serde_json::json!({
            "name": "svc1",
            "timeout_sec": 10,
            "networks": [{"network_url": "net-a"}],
        });
        let desired = DesiredState::from_json(&spec(), &document)
            .unwrap_or_else(|err| panic!("desired state should parse: {err}"));
        assert_eq!(desired.get("name"), Some(&FieldValue::from("svc1")));
        assert_eq!(desired.get("timeout_sec"), Some(&FieldValue::Int(10)));
        assert!(!desired.contains("enable_logging"));
    }

    #[test]
    fn from_json_rejects_unknown_fields() {
        let document = serde_json::json!({"colour": "red"});
        let result = DesiredState::from_json(&spec(), &document);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn from_json_rejects_kind_mismatch() {
        let document = serde_json::json!({"timeout_sec": "ten"});
        let result = DesiredState::from_json(&spec(), &document);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn from_json_treats_null_as_explicit_clear() {
        let document = serde_json::json!({"networks": null});
        let desired = DesiredState::from_json(&spec(), &document)
            .unwrap_or_else(|err| panic!("desired state should parse: {err}"));
        let value = desired
            .get("networks")
            .unwrap_or_else(|| panic!("networks should be present"));
        assert!(value.is_zero());
    }

    #[test]
    fn handles_render_a_stable_description() {
        let mut identity = BTreeMap::new();
        identity.insert(String::from("project"), String::from("myproj"));
        identity.insert(String::from("name"), String::from("mypolicy"));
        let handle = ResourceHandle::new(String::from("dns_policy"), identity);
        assert_eq!(handle.describe(), "dns_policy[name=mypolicy, project=myproj]");
    }
}
