//! Diff engine producing the minimal changeset between desired and remote
//! state.
//!
//! Only fields explicitly present in the desired state are compared; a field
//! the caller never mentioned is never erased implicitly. Set-valued fields
//! compare by content, so a remote collection that differs only in ordering
//! is not a change.

use crate::error::EngineError;
use crate::spec::{Mutability, ResourceSpec};
use crate::state::{DesiredState, RemoteState};
use crate::value::FieldValue;

/// A single field-level difference.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldChange {
    name: String,
    old: Option<FieldValue>,
    new: FieldValue,
    forces_replacement: bool,
}

impl FieldChange {
    /// Name of the changed field.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last known remote value, when the server reported one.
    #[must_use]
    pub const fn old(&self) -> Option<&FieldValue> {
        self.old.as_ref()
    }

    /// Value the caller wants.
    #[must_use]
    pub const fn new_value(&self) -> &FieldValue {
        &self.new
    }

    /// Whether this change can only be applied by recreating the resource.
    #[must_use]
    pub const fn forces_replacement(&self) -> bool {
        self.forces_replacement
    }
}

/// Ordered, ephemeral sequence of field changes; computed fresh per update.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

impl ChangeSet {
    /// Reports whether converging requires no remote calls.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether any change requires delete-and-recreate.
    #[must_use]
    pub fn requires_replacement(&self) -> bool {
        self.changes.iter().any(FieldChange::forces_replacement)
    }

    /// Iterates changes in spec declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldChange> {
        self.changes.iter()
    }

    /// Names of all changed fields, in order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.changes
            .iter()
            .map(|change| change.name.clone())
            .collect()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a FieldChange;
    type IntoIter = std::slice::Iter<'a, FieldChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Computes the minimal changeset converging `remote` towards `desired`.
///
/// Fields are visited in spec declaration order. Server-computed fields may
/// not appear in the desired state.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] when the desired state references an
/// unknown or computed field.
pub fn diff(
    spec: &ResourceSpec,
    desired: &DesiredState,
    remote: &RemoteState,
) -> Result<ChangeSet, EngineError> {
    for (name, _) in desired.iter() {
        let field = spec.field(name).ok_or_else(|| {
            EngineError::Validation(format!(
                "unknown field '{name}' for resource type {}",
                spec.type_name()
            ))
        })?;
        if field.mutability() == Mutability::Computed {
            return Err(EngineError::Validation(format!(
                "field '{name}' is server-computed and cannot be diffed"
            )));
        }
    }

    let mut changes = Vec::new();
    for field in spec.fields() {
        let Some(wanted) = desired.get(field.name()) else {
            continue;
        };
        let current = remote.get(field.name());
        // FieldValue equality is order-insensitive for sets, so a reordered
        // collection does not register as drift. A zero desired value only
        // counts as drift when the remote side actually holds something.
        let matches = match current {
            Some(existing) => existing == wanted,
            None => wanted.is_zero(),
        };
        if matches {
            continue;
        }
        changes.push(FieldChange {
            name: field.name().to_owned(),
            old: current.cloned(),
            new: wanted.clone(),
            forces_replacement: field.mutability() == Mutability::Immutable,
        });
    }
    Ok(ChangeSet { changes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FieldDef;
    use crate::value::{FieldKind, FieldSet};
    use std::collections::BTreeMap;

    fn spec() -> ResourceSpec {
        ResourceSpec::builder("backend_service")
            .create_path("projects/{{project}}/backendServices")
            .resource_path("projects/{{project}}/backendServices/{{name}}")
            .identity(["project", "name"])
            .field(FieldDef::new("name", FieldKind::Str).required().immutable())
            .field(FieldDef::new("project", FieldKind::Str).immutable())
            .field(FieldDef::new("timeout_sec", FieldKind::Int))
            .field(FieldDef::new("protocol", FieldKind::Str))
            .field(FieldDef::new("health_checks", FieldKind::Set))
            .field(FieldDef::new("fingerprint", FieldKind::Str).computed())
            .build()
            .unwrap_or_else(|err| panic!("spec should build: {err}"))
    }

    fn remote_svc1() -> RemoteState {
        let mut remote = RemoteState::new();
        remote.set("name", FieldValue::from("svc1"));
        remote.set("timeout_sec", FieldValue::Int(10));
        remote.set("protocol", FieldValue::from("HTTP"));
        remote
    }

    #[test]
    fn matching_desired_state_yields_no_changes() {
        let mut desired = DesiredState::new();
        desired.set("name", "svc1");
        desired.set("timeout_sec", 10_i64);

        let changes = diff(&spec(), &desired, &remote_svc1())
            .unwrap_or_else(|err| panic!("diff: {err}"));
        assert!(changes.is_empty(), "remote-only fields must not diff");
    }

    #[test]
    fn changed_mutable_field_is_reported_with_old_and_new() {
        let mut desired = DesiredState::new();
        desired.set("name", "svc1");
        desired.set("timeout_sec", 20_i64);

        let changes = diff(&spec(), &desired, &remote_svc1())
            .unwrap_or_else(|err| panic!("diff: {err}"));
        assert_eq!(changes.len(), 1);
        let change = changes
            .iter()
            .next()
            .unwrap_or_else(|| panic!("one change expected"));
        assert_eq!(change.name(), "timeout_sec");
        assert_eq!(change.old(), Some(&FieldValue::Int(10)));
        assert_eq!(change.new_value(), &FieldValue::Int(20));
        assert!(!changes.requires_replacement());
    }

    #[test]
    fn changed_immutable_field_requires_replacement() {
        let mut desired = DesiredState::new();
        desired.set("name", "svc2");

        let changes = diff(&spec(), &desired, &remote_svc1())
            .unwrap_or_else(|err| panic!("diff: {err}"));
        assert!(changes.requires_replacement());
    }

    #[test]
    fn reordered_sets_do_not_register_as_drift() {
        fn check(url: &str) -> FieldValue {
            let mut map = BTreeMap::new();
            map.insert(String::from("health_check"), FieldValue::from(url));
            FieldValue::Object(map)
        }

        let mut desired = DesiredState::new();
        desired.set(
            "health_checks",
            FieldValue::Set([check("a"), check("b")].into_iter().collect::<FieldSet>()),
        );
        let mut remote = remote_svc1();
        remote.set(
            "health_checks",
            FieldValue::Set([check("b"), check("a")].into_iter().collect::<FieldSet>()),
        );

        let changes =
            diff(&spec(), &desired, &remote).unwrap_or_else(|err| panic!("diff: {err}"));
        assert!(changes.is_empty());
    }

    #[test]
    fn absent_desired_fields_are_never_erased() {
        let desired = DesiredState::new();
        let changes = diff(&spec(), &desired, &remote_svc1())
            .unwrap_or_else(|err| panic!("diff: {err}"));
        assert!(changes.is_empty());
    }

    #[test]
    fn zero_desired_value_matches_missing_remote_field() {
        let mut desired = DesiredState::new();
        desired.set("health_checks", FieldValue::Set(FieldSet::new()));
        let changes = diff(&spec(), &desired, &remote_svc1())
            .unwrap_or_else(|err| panic!("diff: {err}"));
        assert!(changes.is_empty(), "clearing an already-absent field is a no-op");
    }

    #[test]
    fn computed_fields_cannot_be_desired() {
        let mut desired = DesiredState::new();
        desired.set("fingerprint", "abc");
        let result = diff(&spec(), &desired, &remote_svc1());
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }
}
