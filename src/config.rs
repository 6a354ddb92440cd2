//! Deployment configuration loading and validation.
//!
//! Values merge defaults, `liftoff.toml`, and `LIFTOFF_*` environment
//! variables via `ortho-config`; the binary applies CLI flag overrides on
//! top. Validation collects every rule violation before reporting, so an
//! operator sees all problems in one pass rather than one at a time.

use std::collections::BTreeMap;
use std::ffi::OsString;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Deployment configuration consumed by the packager and reconcilers.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "LIFTOFF",
    discovery(
        app_name = "liftoff",
        env_var = "LIFTOFF_CONFIG_PATH",
        config_file_name = "liftoff.toml",
        dotfile_name = ".liftoff.toml",
        project_file_name = "liftoff.toml"
    )
)]
pub struct DeployConfig {
    /// Application name, used verbatim as the root of every derived resource
    /// name.
    #[ortho_config(default = String::new())]
    pub name: String,
    /// Human description attached to the function and the API.
    #[ortho_config(default = "No description".to_owned())]
    pub description: String,
    /// AWS region receiving the deployment, for example `eu-central-1`.
    #[ortho_config(default = String::new())]
    pub region: String,
    /// Deployment environment; names the API stage and the function alias.
    #[ortho_config(default = "dev".to_owned())]
    pub environment: String,
    /// TCP port the bundled server binds to.
    #[ortho_config(default = 0)]
    pub port: u16,
    /// Per-environment stage variable overrides, keyed by environment name.
    #[ortho_config(default = BTreeMap::new(), skip_cli)]
    pub variables: BTreeMap<String, BTreeMap<String, String>>,
}

impl DeployConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("liftoff")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks every configuration rule and collects the violations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigViolations`] listing every rule the configuration
    /// breaks.
    pub fn validate(&self) -> Result<(), ConfigViolations> {
        let mut violations = Vec::new();
        if self.name.trim().is_empty() {
            violations.push(ConfigViolation::MissingName);
        }
        if self.region.trim().is_empty() {
            violations.push(ConfigViolation::MissingRegion);
        }
        if self.port == 0 {
            violations.push(ConfigViolation::MissingPort);
        }
        if self.environment.is_empty() {
            violations.push(ConfigViolation::MissingEnvironment);
        } else if self.environment.chars().any(char::is_whitespace) {
            violations.push(ConfigViolation::EnvironmentWhitespace);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigViolations { violations })
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

/// A single configuration rule violation.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum ConfigViolation {
    /// The deployment name is empty.
    #[error("'name' must not be empty")]
    MissingName,
    /// The target region is empty.
    #[error("'region' must not be empty")]
    MissingRegion,
    /// The server port is unset.
    #[error("'port' must be set to the port the server binds to")]
    MissingPort,
    /// The environment is empty.
    #[error("'environment' must not be empty")]
    MissingEnvironment,
    /// The environment contains whitespace.
    #[error("'environment' must not contain whitespace")]
    EnvironmentWhitespace,
}

/// Every violation found in one validation pass.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("invalid configuration: {}", render_violations(.violations))]
pub struct ConfigViolations {
    violations: Vec<ConfigViolation>,
}

impl ConfigViolations {
    /// Returns the individual violations for per-line reporting.
    #[must_use]
    pub fn violations(&self) -> &[ConfigViolation] {
        &self.violations
    }
}

fn render_violations(violations: &[ConfigViolation]) -> String {
    let rendered: Vec<String> = violations.iter().map(ConfigViolation::to_string).collect();
    rendered.join("; ")
}
