//! Test support utilities shared across unit and integration tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::error::EngineError;
use crate::rest::{Transport, TransportFuture};

/// Scripted transport that returns pre-seeded responses in FIFO order.
///
/// Used to drive deterministic remote outcomes without a server, while
/// recording every request for assertions.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<serde_json::Value, ScriptedFailure>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Records a single request made through [`ScriptedTransport`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordedRequest {
    /// HTTP verb as a string (`GET`, `POST`, `PATCH`, `DELETE`).
    pub method: String,
    /// Resource path as passed to the transport.
    pub path: String,
    /// Request body, when the verb carries one.
    pub body: Option<serde_json::Value>,
}

/// Failure outcomes a script can seed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScriptedFailure {
    /// The resource is absent.
    NotFound,
    /// A resource with the same identity already exists.
    Conflict,
    /// Any other remote failure with a status code and message.
    Remote(u16, String),
}

impl ScriptedFailure {
    fn into_error(self, path: &str) -> EngineError {
        match self {
            Self::NotFound => EngineError::NotFound {
                resource: path.to_owned(),
            },
            Self::Conflict => EngineError::Conflict {
                resource: path.to_owned(),
            },
            Self::Remote(status, message) => EngineError::Remote { status, message },
        }
    }
}

impl ScriptedTransport {
    /// Creates a transport with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful JSON response.
    pub fn push_ok(&self, body: serde_json::Value) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(body));
    }

    /// Queues a not-found outcome.
    pub fn push_not_found(&self) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(ScriptedFailure::NotFound));
    }

    /// Queues a conflict outcome.
    pub fn push_conflict(&self) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(ScriptedFailure::Conflict));
    }

    /// Queues a remote failure with a status and message.
    pub fn push_remote_error(&self, status: u16, message: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(ScriptedFailure::Remote(status, message.into())));
    }

    /// Returns a snapshot of all requests recorded so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn dispatch(
        &self,
        method: &str,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, EngineError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                method: method.to_owned(),
                path: path.to_owned(),
                body,
            });
        let next = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(failure)) => Err(failure.into_error(path)),
            None => Err(EngineError::Transport {
                message: format!("no scripted response available for {method} {path}"),
            }),
        }
    }
}

impl Transport for ScriptedTransport {
    fn get<'a>(&'a self, path: &'a str) -> TransportFuture<'a, serde_json::Value> {
        Box::pin(async move { self.dispatch("GET", path, None) })
    }

    fn post<'a>(
        &'a self,
        path: &'a str,
        body: serde_json::Value,
    ) -> TransportFuture<'a, serde_json::Value> {
        Box::pin(async move { self.dispatch("POST", path, Some(body)) })
    }

    fn patch<'a>(
        &'a self,
        path: &'a str,
        body: serde_json::Value,
    ) -> TransportFuture<'a, serde_json::Value> {
        Box::pin(async move { self.dispatch("PATCH", path, Some(body)) })
    }

    fn delete<'a>(&'a self, path: &'a str) -> TransportFuture<'a, serde_json::Value> {
        Box::pin(async move { self.dispatch("DELETE", path, None) })
    }
}
