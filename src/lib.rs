//! Core library for the Tiller reconciliation engine.
//!
//! The crate exposes a declarative model for REST-managed resources: a
//! resource spec describes fields and identity, a diff engine computes the
//! minimal changeset between desired and remote state, and a driver applies
//! it (create → update or replace → re-read) over a pluggable transport.

pub mod apply;
pub mod codec;
pub mod config;
pub mod diff;
pub mod error;
pub mod import;
pub mod reconcile;
pub mod resources;
pub mod rest;
pub mod spec;
pub mod state;
pub mod store;
pub mod test_support;
pub mod value;

pub use apply::ChangeApplier;
pub use codec::{CodecError, CodecRegistry, FieldCodec, MappedCodec, RawObjectCodec, ScalarCodec};
pub use config::{ConfigError, EngineConfig};
pub use diff::{ChangeSet, FieldChange, diff};
pub use error::EngineError;
pub use import::parse_import_id;
pub use reconcile::Reconciler;
pub use resources::{RESOURCE_TYPES, ResourceDefinition};
pub use rest::{OperationTimeouts, RestTransport, Transport};
pub use spec::{FieldDef, Mutability, ResourceSpec, SpecError};
pub use state::{DesiredState, RemoteState, ResourceHandle};
pub use store::{FileStateStore, MemoryStateStore, StateSnapshot, StateStore};
pub use value::{FieldKind, FieldSet, FieldValue};
