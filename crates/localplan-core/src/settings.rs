//! Settings shared by every environment of a run.

use crate::log::Severity;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target scope of `az deployment` commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum DeploymentScope {
    Subscription,
    Tenant,
    ResourceGroup(String),
    ManagementGroup(String),
}

impl DeploymentScope {
    /// The `az deployment` sub-group for this scope.
    pub fn az_group(&self) -> &'static str {
        match self {
            DeploymentScope::Subscription => "sub",
            DeploymentScope::Tenant => "tenant",
            DeploymentScope::ResourceGroup(_) => "group",
            DeploymentScope::ManagementGroup(_) => "mg",
        }
    }
}

impl fmt::Display for DeploymentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentScope::Subscription => write!(f, "subscription"),
            DeploymentScope::Tenant => write!(f, "tenant"),
            DeploymentScope::ResourceGroup(name) => write!(f, "resourceGroup:{}", name),
            DeploymentScope::ManagementGroup(id) => write!(f, "managementGroup:{}", id),
        }
    }
}

impl FromStr for DeploymentScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, name) = match s.split_once(':') {
            Some((kind, name)) => (kind, Some(name.trim())),
            None => (s, None),
        };

        match (kind.trim().to_ascii_lowercase().as_str(), name) {
            ("subscription" | "sub", None) => Ok(DeploymentScope::Subscription),
            ("tenant", None) => Ok(DeploymentScope::Tenant),
            ("resourcegroup" | "group", Some(n)) if !n.is_empty() => {
                Ok(DeploymentScope::ResourceGroup(n.to_string()))
            }
            ("managementgroup" | "mg", Some(n)) if !n.is_empty() => {
                Ok(DeploymentScope::ManagementGroup(n.to_string()))
            }
            _ => Err(Error::InvalidInput(format!("unknown deployment scope: {}", s))),
        }
    }
}

/// Process-wide settings, built once per run and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    /// Resource providers that must be registered in each subscription.
    pub providers: Vec<String>,
    /// Scope of validate and what-if deployments.
    pub scope: DeploymentScope,
    /// PSRule baseline.
    pub baseline: String,
    /// PSRule modules to load.
    pub modules: Vec<String>,
    /// PSRule options file.
    pub option: String,
    /// Lowest severity written to the run log file.
    pub log_severity: Severity,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            providers: vec!["Microsoft.Resources".to_string()],
            scope: DeploymentScope::Subscription,
            baseline: "Azure.Default".to_string(),
            modules: vec!["PSRule.Rules.Azure".to_string()],
            option: "ps-rule.yaml".to_string(),
            log_severity: Severity::Info,
        }
    }
}

/// Names of the settings recognized in pipeline documents.
pub const SETTING_KEYS: [&str; 6] = [
    "providers",
    "scope",
    "baseline",
    "modules",
    "option",
    "logSeverity",
];

impl GlobalConfig {
    /// Overwrite one field from its raw textual value.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "providers" => self.providers = split_list(value),
            "scope" => self.scope = value.parse()?,
            "baseline" => self.baseline = value.to_string(),
            "modules" => self.modules = split_list(value),
            "option" => self.option = value.to_string(),
            "logSeverity" => {
                self.log_severity = value.parse().map_err(Error::InvalidInput)?;
            }
            other => return Err(Error::InvalidInput(format!("unknown setting: {}", other))),
        }
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
