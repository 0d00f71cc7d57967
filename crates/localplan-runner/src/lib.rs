//! Plan execution for localplan.
//!
//! This crate contains:
//! - Stage command builders and the per-stage exit contract
//! - Process-backed and dry-run tool runners
//! - The orchestrator that walks environments and stages
//! - Artifact directory handling

pub mod artifacts;
pub mod error;
pub mod orchestrator;
pub mod process;
pub mod stages;

pub use artifacts::{ArtifactLayout, remove_bicep_byproducts};
pub use error::{RunnerError, RunnerResult};
pub use orchestrator::{PlanOptions, PlanOrchestrator, PlanResult};
pub use process::{DryRunRunner, ProcessRunner};
pub use stages::{StageContext, Toolchain, run_stage};
