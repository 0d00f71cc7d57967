//! Core domain types for localplan.
//!
//! This crate contains:
//! - Environment keys and resolved per-environment configuration
//! - Process-wide settings (providers, scope, compliance options)
//! - The leveled run log with warning/error counters
//! - Stage and run result types
//! - The tool runner trait external commands go through
//! - Run identifiers

pub mod environment;
pub mod error;
pub mod id;
pub mod log;
pub mod settings;
pub mod stage;
pub mod tool;

pub use environment::{EnvironmentConfig, EnvironmentKey, EnvironmentMap};
pub use error::{Error, Result};
pub use id::RunId;
pub use log::{RunLog, Severity};
pub use settings::{DeploymentScope, GlobalConfig};
pub use stage::{EnvironmentResult, PlanSummary, StageKind, StageOutcome, StageState};
pub use tool::{ToolInvocation, ToolOutput, ToolRunner};
