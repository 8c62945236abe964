//! Configuration loading via `ortho-config`.

use std::collections::BTreeMap;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::rest::OperationTimeouts;

/// Engine configuration derived from environment variables, configuration
/// files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "TILLER")]
pub struct EngineConfig {
    /// Base URL of the remote API, for example
    /// `https://www.googleapis.com/dns/v1beta2`. Required.
    pub api_endpoint: String,
    /// Bearer token presented on every request. Optional for APIs behind
    /// ambient authentication.
    pub auth_token: Option<String>,
    /// Project identity variable used when the desired state omits one.
    pub default_project: String,
    /// Region identity variable for regional resources.
    #[ortho_config(default = "us-central1".to_owned())]
    pub default_region: String,
    /// Timeout budget for create calls, in seconds.
    #[ortho_config(default = 240)]
    pub create_timeout_secs: u64,
    /// Timeout budget for read calls, in seconds.
    #[ortho_config(default = 60)]
    pub read_timeout_secs: u64,
    /// Timeout budget for update calls, in seconds.
    #[ortho_config(default = 240)]
    pub update_timeout_secs: u64,
    /// Timeout budget for delete calls, in seconds.
    #[ortho_config(default = 240)]
    pub delete_timeout_secs: u64,
    /// Directory holding persisted resource snapshots.
    #[ortho_config(default = ".tiller/state".to_owned())]
    pub state_dir: String,
}

/// Metadata for a configuration field, used to generate actionable error
/// messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl EngineConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to tiller.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments.
    /// Values still merge defaults, configuration files, and environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("tiller")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages
    /// include guidance on how to provide missing values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.api_endpoint,
            &FieldMetadata::new("remote API endpoint", "TILLER_API_ENDPOINT", "api_endpoint"),
        )?;
        Self::require_field(
            &self.default_project,
            &FieldMetadata::new(
                "default project",
                "TILLER_DEFAULT_PROJECT",
                "default_project",
            ),
        )?;
        Self::require_field(
            &self.default_region,
            &FieldMetadata::new("default region", "TILLER_DEFAULT_REGION", "default_region"),
        )?;
        Self::require_field(
            &self.state_dir,
            &FieldMetadata::new("state directory", "TILLER_STATE_DIR", "state_dir"),
        )?;
        Ok(())
    }

    /// Per-operation-class timeout budgets.
    #[must_use]
    pub const fn timeouts(&self) -> OperationTimeouts {
        OperationTimeouts {
            create: Duration::from_secs(self.create_timeout_secs),
            read: Duration::from_secs(self.read_timeout_secs),
            update: Duration::from_secs(self.update_timeout_secs),
            delete: Duration::from_secs(self.delete_timeout_secs),
        }
    }

    /// Identity variable defaults merged into every handle.
    #[must_use]
    pub fn identity_defaults(&self) -> BTreeMap<String, String> {
        let mut defaults = BTreeMap::new();
        defaults.insert(String::from("project"), self.default_project.clone());
        defaults.insert(String::from("region"), self.default_region.clone());
        defaults
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> EngineConfig {
        EngineConfig {
            api_endpoint: String::from("https://api.example.com/v1"),
            auth_token: Some(String::from("token")),
            default_project: String::from("myproj"),
            default_region: String::from("us-central1"),
            create_timeout_secs: 240,
            read_timeout_secs: 60,
            update_timeout_secs: 240,
            delete_timeout_secs: 240,
            state_dir: String::from(".tiller/state"),
        }
    }

    #[test]
    fn validation_accepts_a_complete_config() {
        assert_eq!(valid_config().validate(), Ok(()));
    }

    #[test]
    fn validation_rejects_missing_endpoint_with_actionable_error() {
        let cfg = EngineConfig {
            api_endpoint: String::new(),
            ..valid_config()
        };
        let Err(error) = cfg.validate() else {
            panic!("endpoint should be required");
        };
        let ConfigError::MissingField(ref message) = error else {
            panic!("expected MissingField error");
        };
        assert!(
            message.contains("TILLER_API_ENDPOINT"),
            "error should mention env var: {message}"
        );
        assert!(
            message.contains("tiller.toml"),
            "error should mention config file: {message}"
        );
    }

    #[test]
    fn timeouts_reflect_configured_budgets() {
        let cfg = EngineConfig {
            create_timeout_secs: 10,
            ..valid_config()
        };
        assert_eq!(cfg.timeouts().create, Duration::from_secs(10));
        assert_eq!(cfg.timeouts().read, Duration::from_secs(60));
    }

    #[test]
    fn identity_defaults_cover_project_and_region() {
        let defaults = valid_config().identity_defaults();
        assert_eq!(defaults.get("project").map(String::as_str), Some("myproj"));
        assert_eq!(
            defaults.get("region").map(String::as_str),
            Some("us-central1")
        );
    }
}
