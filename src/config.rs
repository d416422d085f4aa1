//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::wait::WaitOptions;

/// Provider configuration derived from environment variables, configuration
/// files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "OSC")]
pub struct OutscaleConfig {
    /// Access key presented to the API on every call.
    pub access_key: String,
    /// Secret key presented to the API on every call.
    pub secret_key: String,
    /// Base URL of the provider endpoint.
    #[ortho_config(default = "https://fcu.eu-west-2.outscale.com".to_owned())]
    pub endpoint: String,
    /// Availability zone used when a workflow has no better hint.
    #[ortho_config(default = "eu-west-2a".to_owned())]
    pub default_zone: String,
    /// Seconds between consecutive state polls.
    #[ortho_config(default = 1)]
    pub poll_interval_secs: u64,
    /// Seconds before a single wait gives up.
    #[ortho_config(default = 300)]
    pub wait_timeout_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }
}

impl OutscaleConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to [{}] in skylift.toml",
                metadata.description, metadata.env_var, metadata.toml_key, metadata.section
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("skylift")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Polling parameters derived from the configured intervals.
    #[must_use]
    pub const fn wait_options(&self) -> WaitOptions {
        WaitOptions::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.wait_timeout_secs),
        )
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.access_key,
            &FieldMetadata::new("API access key", "OSC_ACCESS_KEY", "access_key", "outscale"),
        )?;
        Self::require_field(
            &self.secret_key,
            &FieldMetadata::new("API secret key", "OSC_SECRET_KEY", "secret_key", "outscale"),
        )?;
        Self::require_field(
            &self.endpoint,
            &FieldMetadata::new("API endpoint", "OSC_ENDPOINT", "endpoint", "outscale"),
        )?;
        Self::require_field(
            &self.default_zone,
            &FieldMetadata::new(
                "availability zone",
                "OSC_DEFAULT_ZONE",
                "default_zone",
                "outscale",
            ),
        )?;
        Ok(())
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
