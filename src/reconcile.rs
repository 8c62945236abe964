//! Reconciliation driver: the CRUD contract every resource type honours.
//!
//! One logical operation per handle at a time; each step is a blocking
//! round-trip to the remote collaborator and remote state is re-fetched
//! after every mutation, never assumed stale-consistent. Coordination
//! between concurrent callers is a collaborator responsibility.

use tracing::info;

use crate::apply::ChangeApplier;
use crate::diff::{ChangeSet, diff};
use crate::error::EngineError;
use crate::import::parse_import_id;
use crate::rest::Transport;
use crate::state::{DesiredState, RemoteState, ResourceHandle};
use crate::store::{StateSnapshot, StateStore};

/// Drives read → diff → apply → re-read cycles for one resource type.
#[derive(Debug)]
pub struct Reconciler<T: Transport, S: StateStore> {
    applier: ChangeApplier<T>,
    store: S,
}

impl<T: Transport, S: StateStore> Reconciler<T, S> {
    /// Creates a driver over an applier and a host state store.
    #[must_use]
    pub fn new(applier: ChangeApplier<T>, store: S) -> Self {
        Self { applier, store }
    }

    fn type_name(&self) -> &str {
        self.applier.spec().type_name()
    }

    fn resolve_handle(
        &self,
        name: &str,
        desired: &DesiredState,
    ) -> Result<ResourceHandle, EngineError> {
        match self.store.load(self.type_name(), name)? {
            Some(snapshot) => Ok(snapshot.handle),
            None => self.applier.handle_for(desired),
        }
    }

    /// Computes the changeset that `converge` would apply, without mutating
    /// anything. A resource that does not exist remotely plans as a create,
    /// diffed against an empty remote state.
    ///
    /// # Errors
    ///
    /// Propagates validation, codec, and remote errors from the read and
    /// diff steps.
    pub async fn plan(
        &self,
        name: &str,
        desired: &DesiredState,
    ) -> Result<ChangeSet, EngineError> {
        let handle = self.resolve_handle(name, desired)?;
        let remote = match self.applier.read(&handle).await {
            Ok(remote) => remote,
            Err(err) if err.is_not_found() => RemoteState::new(),
            Err(err) => return Err(err),
        };
        diff(self.applier.spec(), desired, &remote)
    }

    /// Converges the remote resource to the desired state and returns the
    /// refreshed remote view.
    ///
    /// An empty changeset is a no-op; a changeset touching an immutable
    /// field triggers replacement (delete then create); anything else is an
    /// in-place update. A resource that vanished out-of-band is recreated.
    ///
    /// # Errors
    ///
    /// Propagates errors from any step. Codec and diff failures abort before
    /// any remote call is made.
    pub async fn converge(
        &self,
        name: &str,
        desired: &DesiredState,
    ) -> Result<RemoteState, EngineError> {
        let mut handle = self.resolve_handle(name, desired)?;

        let current = match self.applier.read(&handle).await {
            Ok(remote) => Some(remote),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };

        match current {
            None => {
                info!(resource = handle.describe(), "resource absent, creating");
                handle = self.applier.create(desired).await?;
            }
            Some(remote) => {
                let changes = diff(self.applier.spec(), desired, &remote)?;
                if changes.is_empty() {
                    self.store.save(
                        name,
                        &StateSnapshot {
                            handle,
                            remote: remote.clone(),
                        },
                    )?;
                    return Ok(remote);
                }
                if changes.requires_replacement() {
                    info!(
                        resource = handle.describe(),
                        fields = ?changes.field_names(),
                        "immutable fields changed, replacing"
                    );
                    self.applier.delete(&handle).await?;
                    handle = self.applier.create(desired).await?;
                } else {
                    info!(
                        resource = handle.describe(),
                        fields = ?changes.field_names(),
                        "updating in place"
                    );
                    self.applier.update(&handle, &changes).await?;
                }
            }
        }

        let refreshed = self.applier.read(&handle).await?;
        self.store.save(
            name,
            &StateSnapshot {
                handle,
                remote: refreshed.clone(),
            },
        )?;
        Ok(refreshed)
    }

    /// Deletes the resource and forgets its stored state. Destroying a
    /// resource that was never created (or is already gone) succeeds.
    ///
    /// # Errors
    ///
    /// Propagates remote errors from the detach or delete calls.
    pub async fn destroy(&self, name: &str) -> Result<(), EngineError> {
        let Some(snapshot) = self.store.load(self.type_name(), name)? else {
            return Ok(());
        };
        self.applier.delete(&snapshot.handle).await?;
        self.store.remove(self.type_name(), name)
    }

    /// Adopts an existing remote resource from an opaque import id,
    /// persisting its handle and current state without creating anything.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ImportMismatch`] for unparseable ids and
    /// propagates the verification read's errors (including `NotFound` when
    /// the id points at nothing).
    pub async fn import(&self, name: &str, id: &str) -> Result<RemoteState, EngineError> {
        let vars = parse_import_id(self.applier.spec(), id)?;
        let handle = self.applier.handle_from_vars(&vars)?;
        let remote = self.applier.read(&handle).await?;
        self.store.save(
            name,
            &StateSnapshot {
                handle,
                remote: remote.clone(),
            },
        )?;
        Ok(remote)
    }
}
