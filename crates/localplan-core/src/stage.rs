//! Plan stage definitions and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{EnvironmentKey, Error, RunId};

/// A step of the emulated plan stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Compile the template and parameters file.
    Build,
    /// Validate the deployment against the subscription.
    Validate,
    /// Check resource provider registration.
    Providers,
    /// Preview changes with what-if.
    WhatIf,
    /// Evaluate compliance rules against the compiled output.
    Compliance,
}

impl StageKind {
    /// Every stage in execution order.
    pub const ALL: [StageKind; 5] = [
        StageKind::Build,
        StageKind::Validate,
        StageKind::Providers,
        StageKind::WhatIf,
        StageKind::Compliance,
    ];

    /// Whether the stage talks to the cloud and needs a subscription id.
    pub fn needs_subscription(self) -> bool {
        matches!(
            self,
            StageKind::Validate | StageKind::Providers | StageKind::WhatIf
        )
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageKind::Build => "build",
            StageKind::Validate => "validate",
            StageKind::Providers => "providers",
            StageKind::WhatIf => "whatif",
            StageKind::Compliance => "compliance",
        })
    }
}

impl FromStr for StageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "build" => Ok(StageKind::Build),
            "validate" => Ok(StageKind::Validate),
            "providers" => Ok(StageKind::Providers),
            "whatif" | "what-if" => Ok(StageKind::WhatIf),
            "compliance" => Ok(StageKind::Compliance),
            other => Err(Error::InvalidInput(format!("unknown stage: {}", other))),
        }
    }
}

/// State of a stage during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum StageState {
    Pending,
    Succeeded,
    Failed { message: String },
    Skipped { reason: String },
}

impl StageState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StageState::Pending)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageState::Succeeded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StageState::Failed { .. })
    }
}

/// Outcome of one stage for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: StageKind,
    #[serde(flatten)]
    pub state: StageState,
}

/// Outcomes of all requested stages for one environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentResult {
    pub key: EnvironmentKey,
    pub stages: Vec<StageOutcome>,
}

impl EnvironmentResult {
    pub fn new(key: EnvironmentKey) -> Self {
        Self {
            key,
            stages: Vec::new(),
        }
    }

    pub fn record(&mut self, stage: StageKind, state: StageState) {
        self.stages.push(StageOutcome { stage, state });
    }

    pub fn state_of(&self, stage: StageKind) -> Option<&StageState> {
        self.stages
            .iter()
            .find(|o| o.stage == stage)
            .map(|o| &o.state)
    }

    pub fn failed(&self) -> bool {
        self.stages.iter().any(|o| o.state.is_failure())
    }
}

/// End-of-run summary, written as `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub warnings: usize,
    pub errors: usize,
    pub environments: Vec<EnvironmentResult>,
}
