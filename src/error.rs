//! Engine-wide error taxonomy.
//!
//! Codec and diff failures abort an operation before any remote call is made.
//! Apply failures after partial field application surface the fields not yet
//! applied; the engine never retries or rolls back on its own.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Raised when desired state is missing or has an invalid field.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Raised when a field value cannot be encoded or decoded.
    #[error("codec error on field '{field}': {message}")]
    Codec {
        /// Field that failed to convert.
        field: String,
        /// Description of the conversion failure.
        message: String,
    },
    /// Raised when a path template contains an unresolved placeholder.
    #[error("unresolved placeholder '{placeholder}' in path template '{template}'")]
    Template {
        /// Placeholder that had no value.
        placeholder: String,
        /// The offending template.
        template: String,
    },
    /// Raised when the remote side reports the resource as absent.
    ///
    /// Surfaced distinctly from other remote errors so callers can treat
    /// "already gone" as a valid terminal state.
    #[error("resource {resource} not found")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },
    /// Raised when creating a resource whose identity already exists.
    #[error("resource {resource} already exists")]
    Conflict {
        /// Description of the conflicting resource.
        resource: String,
    },
    /// Raised for any other non-2xx response from the remote API.
    #[error("remote API error (status {status}): {message}")]
    Remote {
        /// HTTP status code returned by the server.
        status: u16,
        /// Message carried in the response body, when present.
        message: String,
    },
    /// Raised when an operation exceeds its timeout budget.
    #[error("operation {operation} exceeded its {budget:?} budget")]
    Timeout {
        /// Operation class that timed out.
        operation: String,
        /// Budget that was exceeded.
        budget: Duration,
    },
    /// Raised when a connection-level failure prevented a response.
    #[error("transport failure: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },
    /// Raised when an update fails after some fields were already applied.
    ///
    /// Already-applied fields are not rolled back; `pending` lists the
    /// fields whose updates were never issued or did not succeed.
    #[error("update left fields unapplied: {}", pending.join(", "))]
    PartialUpdate {
        /// Fields not yet applied when the failure occurred.
        pending: Vec<String>,
        /// The failure that interrupted the update.
        #[source]
        source: Box<EngineError>,
    },
    /// Raised when an import id matches none of the spec's patterns.
    #[error("import id '{id}' matched no pattern for resource type {resource}")]
    ImportMismatch {
        /// The opaque import identifier.
        id: String,
        /// Resource type being imported.
        resource: String,
    },
    /// Raised when the host state store fails to persist or recall state.
    #[error("state store failure: {message}")]
    Store {
        /// Description of the failure.
        message: String,
    },
}

impl EngineError {
    /// Reports whether this error means the resource is absent remotely.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
