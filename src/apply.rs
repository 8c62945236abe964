//! Change applier: issues the minimal remote calls converging a resource
//! towards its desired state.
//!
//! The lifecycle is `absent → creating → present → updating → present →
//! deleting → absent`; replacement (delete then create) is orchestrated by
//! the reconciliation driver, never here. Partial update failures are not
//! rolled back; the error names the fields that were never applied.

use std::collections::BTreeMap;

use tracing::debug;

use crate::codec::CodecRegistry;
use crate::diff::{ChangeSet, FieldChange};
use crate::error::EngineError;
use crate::rest::{Transport, resolve_path};
use crate::spec::ResourceSpec;
use crate::state::{DesiredState, RemoteState, ResourceHandle};
use crate::value::FieldValue;

/// Applies changesets for one resource type through a [`Transport`].
#[derive(Debug)]
pub struct ChangeApplier<T: Transport> {
    transport: T,
    spec: ResourceSpec,
    codecs: CodecRegistry,
    defaults: BTreeMap<String, String>,
}

impl<T: Transport> ChangeApplier<T> {
    /// Creates an applier. `defaults` supplies identity variables (such as
    /// the project) that the caller's desired state may omit.
    #[must_use]
    pub fn new(
        transport: T,
        spec: ResourceSpec,
        codecs: CodecRegistry,
        defaults: BTreeMap<String, String>,
    ) -> Self {
        Self {
            transport,
            spec,
            codecs,
            defaults,
        }
    }

    /// The spec this applier operates on.
    #[must_use]
    pub const fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    /// Builds a handle from identity variables recovered elsewhere (import),
    /// filling gaps from the configured defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when an identity variable has no
    /// value from either source.
    pub fn handle_from_vars(
        &self,
        recovered: &BTreeMap<String, String>,
    ) -> Result<ResourceHandle, EngineError> {
        let mut identity = BTreeMap::new();
        for name in self.spec.identity() {
            let value = recovered
                .get(name)
                .or_else(|| self.defaults.get(name))
                .ok_or_else(|| {
                    EngineError::Validation(format!("missing identity variable '{name}'"))
                })?;
            identity.insert(name.clone(), value.clone());
        }
        Ok(ResourceHandle::new(
            self.spec.type_name().to_owned(),
            identity,
        ))
    }

    /// Derives the handle a desired state would create, without any remote
    /// call.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when an identity field is neither
    /// set nor defaulted.
    pub fn handle_for(&self, desired: &DesiredState) -> Result<ResourceHandle, EngineError> {
        let vars = self.identity_from_desired(desired)?;
        Ok(ResourceHandle::new(self.spec.type_name().to_owned(), vars))
    }

    fn identity_from_desired(
        &self,
        desired: &DesiredState,
    ) -> Result<BTreeMap<String, String>, EngineError> {
        let mut vars = BTreeMap::new();
        for name in self.spec.identity() {
            match desired.get(name) {
                Some(FieldValue::Str(value)) if !value.is_empty() => {
                    vars.insert(name.clone(), value.clone());
                }
                Some(other) => {
                    return Err(EngineError::Validation(format!(
                        "identity field '{name}' must be a non-empty string, got {}",
                        other.kind().name()
                    )));
                }
                None => {
                    let value = self.defaults.get(name).ok_or_else(|| {
                        EngineError::Validation(format!(
                            "identity field '{name}' is neither set nor defaulted"
                        ))
                    })?;
                    vars.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(vars)
    }

    fn validate_required(&self, desired: &DesiredState) -> Result<(), EngineError> {
        for field in self.spec.fields() {
            if field.is_required() && !desired.contains(field.name()) {
                return Err(EngineError::Validation(format!(
                    "required field '{}' is not set",
                    field.name()
                )));
            }
        }
        Ok(())
    }

    /// Creates the resource with a single POST of the encoded desired state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when required fields are absent,
    /// [`EngineError::Conflict`] when the identity already exists, and
    /// remote/transport errors otherwise. Codec failures abort before any
    /// remote call.
    pub async fn create(&self, desired: &DesiredState) -> Result<ResourceHandle, EngineError> {
        self.validate_required(desired)?;
        let body = self.codecs.encode_desired(&self.spec, desired)?;
        let vars = self.identity_from_desired(desired)?;
        let path = resolve_path(self.spec.create_path(), &vars)?;

        debug!(resource = self.spec.type_name(), path, "creating resource");
        self.transport
            .post(&path, serde_json::Value::Object(body))
            .await?;

        Ok(ResourceHandle::new(self.spec.type_name().to_owned(), vars))
    }

    /// Fetches the current remote state. Always a fresh round-trip; the
    /// engine never caches between calls.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the resource is absent, which
    /// callers may treat as a valid terminal state.
    pub async fn read(&self, handle: &ResourceHandle) -> Result<RemoteState, EngineError> {
        let path = resolve_path(self.spec.resource_path(), handle.vars())?;
        let body = self.transport.get(&path).await?;
        self.codecs.decode_remote(&self.spec, &body)
    }

    /// Applies an in-place changeset as the minimal PATCH sequence.
    ///
    /// Changed fields sharing an update path are batched into one call;
    /// fields with a dedicated update path get their own. On failure,
    /// already-applied batches stay applied and the error lists the fields
    /// not yet converged.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when the changeset demands
    /// replacement, and [`EngineError::PartialUpdate`] when a batch fails
    /// midway.
    pub async fn update(
        &self,
        handle: &ResourceHandle,
        changes: &ChangeSet,
    ) -> Result<(), EngineError> {
        if changes.requires_replacement() {
            return Err(EngineError::Validation(String::from(
                "changeset requires replacement; converge through the reconciliation driver",
            )));
        }
        if changes.is_empty() {
            return Ok(());
        }

        let batches = self.batch_changes(changes)?;
        for (index, (template, batch)) in batches.iter().enumerate() {
            let path = resolve_path(template, handle.vars())?;
            let mut body = serde_json::Map::new();
            for change in batch {
                let field = self.lookup_field(change.name())?;
                body.insert(
                    field.wire_name().to_owned(),
                    self.codecs.encode_for_update(field, change.new_value())?,
                );
            }

            debug!(
                resource = self.spec.type_name(),
                path,
                fields = ?batch.iter().map(|c| c.name()).collect::<Vec<_>>(),
                "patching resource"
            );
            if let Err(err) = self
                .transport
                .patch(&path, serde_json::Value::Object(body))
                .await
            {
                let pending = batches
                    .iter()
                    .skip(index)
                    .flat_map(|(_, remaining)| remaining.iter())
                    .map(|change| change.name().to_owned())
                    .collect();
                return Err(EngineError::PartialUpdate {
                    pending,
                    source: Box::new(err),
                });
            }
        }
        Ok(())
    }

    /// Deletes the resource. Idempotent: deleting an absent resource
    /// succeeds. When the spec declares a detach field and the live resource
    /// still holds references in it, a detach PATCH precedes the DELETE.
    ///
    /// # Errors
    ///
    /// Returns remote/transport errors from the detach or delete calls.
    pub async fn delete(&self, handle: &ResourceHandle) -> Result<(), EngineError> {
        let remote = match self.read(handle).await {
            Ok(remote) => remote,
            Err(err) if err.is_not_found() => {
                debug!(resource = handle.describe(), "already absent, delete is a no-op");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let path = resolve_path(self.spec.resource_path(), handle.vars())?;
        if let Some(detach) = self.spec.detach_field()
            && remote
                .get(detach.name())
                .is_some_and(|value| !value.is_zero())
        {
            let mut body = serde_json::Map::new();
            body.insert(detach.wire_name().to_owned(), serde_json::Value::Null);
            debug!(
                resource = handle.describe(),
                field = detach.name(),
                "detaching references before delete"
            );
            self.transport
                .patch(&path, serde_json::Value::Object(body))
                .await?;
        }

        debug!(resource = handle.describe(), "deleting resource");
        match self.transport.delete(&path).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn lookup_field(&self, name: &str) -> Result<&crate::spec::FieldDef, EngineError> {
        self.spec
            .field(name)
            .ok_or_else(|| EngineError::Validation(format!("unknown field '{name}'")))
    }

    /// Groups changes by their update path template, preserving spec order
    /// within and across batches.
    fn batch_changes<'c>(
        &self,
        changes: &'c ChangeSet,
    ) -> Result<Vec<(String, Vec<&'c FieldChange>)>, EngineError> {
        let mut batches: Vec<(String, Vec<&'c FieldChange>)> = Vec::new();
        for change in changes {
            let field = self.lookup_field(change.name())?;
            let template = field
                .dedicated_update_path()
                .unwrap_or(self.spec.resource_path())
                .to_owned();
            if let Some((_, batch)) = batches.iter_mut().find(|(t, _)| *t == template) {
                batch.push(change);
            } else {
                batches.push((template, vec![change]));
            }
        }
        Ok(batches)
    }
}
