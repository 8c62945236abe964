//! Remote collaborator contract and its reqwest-backed implementation.
//!
//! The applier talks to the remote API through the [`Transport`] trait so
//! tests can substitute scripted doubles. The real transport is a thin
//! JSON-over-HTTP client: no retries, no caching, one bounded round-trip per
//! call with the budget chosen by operation class.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use crate::error::EngineError;

/// Future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EngineError>> + Send + 'a>>;

/// HTTP-like request/response surface over named resource paths.
pub trait Transport: Send + Sync {
    /// Fetches the current representation of a resource.
    fn get<'a>(&'a self, path: &'a str) -> TransportFuture<'a, serde_json::Value>;

    /// Creates a resource under a collection path.
    fn post<'a>(&'a self, path: &'a str, body: serde_json::Value)
    -> TransportFuture<'a, serde_json::Value>;

    /// Partially updates a resource.
    fn patch<'a>(
        &'a self,
        path: &'a str,
        body: serde_json::Value,
    ) -> TransportFuture<'a, serde_json::Value>;

    /// Removes a resource.
    fn delete<'a>(&'a self, path: &'a str) -> TransportFuture<'a, serde_json::Value>;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn get<'a>(&'a self, path: &'a str) -> TransportFuture<'a, serde_json::Value> {
        T::get(self, path)
    }

    fn post<'a>(
        &'a self,
        path: &'a str,
        body: serde_json::Value,
    ) -> TransportFuture<'a, serde_json::Value> {
        T::post(self, path, body)
    }

    fn patch<'a>(
        &'a self,
        path: &'a str,
        body: serde_json::Value,
    ) -> TransportFuture<'a, serde_json::Value> {
        T::patch(self, path, body)
    }

    fn delete<'a>(&'a self, path: &'a str) -> TransportFuture<'a, serde_json::Value> {
        T::delete(self, path)
    }
}

/// Independent timeout budgets per operation class.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OperationTimeouts {
    /// Budget for create (POST) calls.
    pub create: Duration,
    /// Budget for read (GET) calls.
    pub read: Duration,
    /// Budget for update (PATCH) calls.
    pub update: Duration,
    /// Budget for delete (DELETE) calls.
    pub delete: Duration,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(240),
            read: Duration::from_secs(60),
            update: Duration::from_secs(240),
            delete: Duration::from_secs(240),
        }
    }
}

/// Substitutes `{{var}}` placeholders in a path template.
///
/// All identity substitution happens before dispatch; templates with
/// unresolved placeholders never reach the wire.
///
/// # Errors
///
/// Returns [`EngineError::Template`] when a placeholder has no value.
pub fn resolve_path(
    template: &str,
    vars: &BTreeMap<String, String>,
) -> Result<String, EngineError> {
    let placeholder = Regex::new(r"\{\{([a-z0-9_]+)\}\}")
        .map_err(|err| EngineError::Validation(err.to_string()))?;

    for caps in placeholder.captures_iter(template) {
        if let Some(name) = caps.get(1)
            && !vars.contains_key(name.as_str())
        {
            return Err(EngineError::Template {
                placeholder: name.as_str().to_owned(),
                template: template.to_owned(),
            });
        }
    }

    let resolved = placeholder.replace_all(template, |caps: &regex::Captures<'_>| {
        caps.get(1)
            .and_then(|name| vars.get(name.as_str()))
            .cloned()
            .unwrap_or_default()
    });
    Ok(resolved.into_owned())
}

/// JSON-over-HTTP transport backed by reqwest.
#[derive(Clone, Debug)]
pub struct RestTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeouts: OperationTimeouts,
}

impl RestTransport {
    /// Creates a transport rooted at `base_url` with optional bearer
    /// authentication.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeouts: OperationTimeouts,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
            timeouts,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn dispatch(
        &self,
        method: reqwest::Method,
        operation: &'static str,
        budget: Duration,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, EngineError> {
        debug!(%method, path, operation, "dispatching remote call");

        let mut request = self
            .client
            .request(method, self.url(path))
            .timeout(budget);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                EngineError::Timeout {
                    operation: operation.to_owned(),
                    budget,
                }
            } else {
                EngineError::Transport {
                    message: err.to_string(),
                }
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|err| EngineError::Transport {
            message: err.to_string(),
        })?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EngineError::NotFound {
                resource: path.to_owned(),
            });
        }
        if status == reqwest::StatusCode::CONFLICT {
            return Err(EngineError::Conflict {
                resource: path.to_owned(),
            });
        }
        if !status.is_success() {
            return Err(EngineError::Remote {
                status: status.as_u16(),
                message: remote_message(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| EngineError::Transport {
            message: format!("malformed response body: {err}"),
        })
    }
}

/// Pulls the human-readable message out of an error body, falling back to
/// the raw text.
fn remote_message(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|body| {
            body.get("error")?
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| text.to_owned())
}

impl Transport for RestTransport {
    fn get<'a>(&'a self, path: &'a str) -> TransportFuture<'a, serde_json::Value> {
        Box::pin(self.dispatch(reqwest::Method::GET, "read", self.timeouts.read, path, None))
    }

    fn post<'a>(
        &'a self,
        path: &'a str,
        body: serde_json::Value,
    ) -> TransportFuture<'a, serde_json::Value> {
        Box::pin(self.dispatch(
            reqwest::Method::POST,
            "create",
            self.timeouts.create,
            path,
            Some(body),
        ))
    }

    fn patch<'a>(
        &'a self,
        path: &'a str,
        body: serde_json::Value,
    ) -> TransportFuture<'a, serde_json::Value> {
        Box::pin(self.dispatch(
            reqwest::Method::PATCH,
            "update",
            self.timeouts.update,
            path,
            Some(body),
        ))
    }

    fn delete<'a>(&'a self, path: &'a str) -> TransportFuture<'a, serde_json::Value> {
        Box::pin(self.dispatch(
            reqwest::Method::DELETE,
            "delete",
            self.timeouts.delete,
            path,
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn placeholders_resolve_from_identity_vars() {
        let resolved = resolve_path(
            "projects/{{project}}/policies/{{name}}",
            &vars(&[("project", "myproj"), ("name", "mypolicy")]),
        )
        .unwrap_or_else(|err| panic!("resolve: {err}"));
        assert_eq!(resolved, "projects/myproj/policies/mypolicy");
    }

    #[test]
    fn unresolved_placeholders_are_errors() {
        let result = resolve_path(
            "projects/{{project}}/policies/{{name}}",
            &vars(&[("project", "myproj")]),
        );
        let Err(EngineError::Template { placeholder, .. }) = result else {
            panic!("expected template error");
        };
        assert_eq!(placeholder, "name");
    }

    #[test]
    fn templates_without_placeholders_pass_through() {
        let resolved = resolve_path("global/backendServices", &vars(&[]))
            .unwrap_or_else(|err| panic!("resolve: {err}"));
        assert_eq!(resolved, "global/backendServices");
    }

    #[test]
    fn remote_messages_prefer_the_structured_error_body() {
        let body = r#"{"error": {"code": 400, "message": "invalid field"}}"#;
        assert_eq!(remote_message(body), "invalid field");
        assert_eq!(remote_message("plain failure"), "plain failure");
    }

    #[test]
    fn urls_join_without_duplicate_slashes() {
        let transport = RestTransport::new(
            "https://api.example.com/v1/",
            None,
            OperationTimeouts::default(),
        );
        assert_eq!(
            transport.url("/projects/p/policies"),
            "https://api.example.com/v1/projects/p/policies"
        );
    }
}
