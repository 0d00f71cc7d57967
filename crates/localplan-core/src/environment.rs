//! Environment keys and resolved per-environment configuration.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Template used when an environment does not name one.
pub const DEFAULT_TEMPLATE: &str = "main.bicep";
/// Deployment location used when an environment does not name one.
pub const DEFAULT_LOCATION: &str = "westeurope";
/// Extension of Bicep parameter files.
pub const PARAMETER_FILE_EXTENSION: &str = "bicepparam";

/// Short identifier of a deployment target (`dev`, `tst`, `uat`, `prod`, ...).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct EnvironmentKey(String);

impl EnvironmentKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build a key from a branch reference, dropping a leading `refs/heads/`.
    pub fn from_branch(branch: &str) -> Self {
        Self::new(branch.strip_prefix("refs/heads/").unwrap_or(branch))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Single path component naming this environment's artifact directory.
    ///
    /// Separators and other characters outside `[A-Za-z0-9._-]` become `_`,
    /// and names made only of dots are replaced, so the result never leaves
    /// its parent directory.
    pub fn dir_name(&self) -> String {
        let name: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if name.chars().all(|c| c == '.') {
            "_".repeat(name.len().max(1))
        } else {
            name
        }
    }

    /// Display name for well-known short codes; unknown keys map to themselves.
    pub fn display_name(&self) -> &str {
        match self.0.as_str() {
            "dev" => "development",
            "tst" | "test" => "test",
            "uat" => "acceptance",
            "prod" => "production",
            other => other,
        }
    }
}

impl From<&str> for EnvironmentKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Resolved configuration for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    /// Azure subscription the environment deploys into. Empty when unknown.
    pub subscription_id: String,
    /// Human readable environment name.
    pub environment: String,
    /// Name of the pipeline service connection.
    pub service_connection: String,
    /// Path to the Bicep template.
    pub template: String,
    /// Path to the Bicep parameters file.
    pub template_parameters: String,
    /// Azure region used for deployment-scoped commands.
    pub location: String,
}

impl EnvironmentConfig {
    /// Configuration made entirely of derived defaults for `key`.
    pub fn defaults_for(key: &EnvironmentKey) -> Self {
        Self {
            subscription_id: String::new(),
            environment: key.as_str().to_string(),
            service_connection: format!("sc-{}", key),
            template: DEFAULT_TEMPLATE.to_string(),
            template_parameters: format!("{}.{}", key, PARAMETER_FILE_EXTENSION),
            location: DEFAULT_LOCATION.to_string(),
        }
    }

    pub fn has_subscription(&self) -> bool {
        !self.subscription_id.trim().is_empty()
    }
}

/// Environments keyed by name, ordered for deterministic output.
pub type EnvironmentMap = BTreeMap<EnvironmentKey, EnvironmentConfig>;
