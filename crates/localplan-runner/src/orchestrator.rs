//! Plan orchestrator - runs the plan stages for each environment in order.

use crate::artifacts::ArtifactLayout;
use crate::stages::{StageContext, Toolchain, run_stage};
use chrono::{DateTime, Utc};
use localplan_core::environment::{EnvironmentConfig, EnvironmentKey, EnvironmentMap};
use localplan_core::tool::ToolRunner;
use localplan_core::{
    EnvironmentResult, GlobalConfig, PlanSummary, RunId, RunLog, StageKind, StageState,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// What to run and where.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Directory templates and parameter files are resolved against.
    pub working_dir: PathBuf,
    /// Stages to run; executed in their natural order regardless of the
    /// order given here.
    pub stages: Vec<StageKind>,
    pub toolchain: Toolchain,
}

impl PlanOptions {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            stages: StageKind::ALL.to_vec(),
            toolchain: Toolchain::default(),
        }
    }

    fn selected(&self) -> impl Iterator<Item = StageKind> + '_ {
        StageKind::ALL
            .into_iter()
            .filter(|stage| self.stages.contains(stage))
    }
}

/// Result of a plan run.
#[derive(Debug)]
pub struct PlanResult {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub environments: Vec<EnvironmentResult>,
}

impl PlanResult {
    pub fn success(&self) -> bool {
        self.environments.iter().all(|e| !e.failed())
    }

    pub fn summary(&self, log: &RunLog) -> PlanSummary {
        PlanSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            success: self.success(),
            warnings: log.warning_count(),
            errors: log.error_count(),
            environments: self.environments.clone(),
        }
    }
}

/// Sequences plan stages across environments.
pub struct PlanOrchestrator {
    runner: Arc<dyn ToolRunner>,
    options: PlanOptions,
}

impl PlanOrchestrator {
    pub fn new(runner: Arc<dyn ToolRunner>, options: PlanOptions) -> Self {
        Self { runner, options }
    }

    /// Run the selected stages for every environment, one after another.
    ///
    /// A failing environment does not stop the others.
    pub async fn run(
        &self,
        environments: &EnvironmentMap,
        settings: &GlobalConfig,
        layout: &ArtifactLayout,
        log: &RunLog,
    ) -> PlanResult {
        let run_id = RunId::new();
        let started_at = Utc::now();
        info!(
            %run_id,
            runner = self.runner.name(),
            environments = environments.len(),
            "Starting plan run"
        );

        let mut results = Vec::with_capacity(environments.len());
        for (key, env) in environments {
            results.push(self.run_environment(key, env, settings, layout, log).await);
        }

        let result = PlanResult {
            run_id,
            started_at,
            finished_at: Utc::now(),
            environments: results,
        };

        if result.success() {
            log.success(format!("Plan run {} completed", run_id));
        } else {
            log.error(format!("Plan run {} completed with failures", run_id));
        }
        result
    }

    async fn run_environment(
        &self,
        key: &EnvironmentKey,
        env: &EnvironmentConfig,
        settings: &GlobalConfig,
        layout: &ArtifactLayout,
        log: &RunLog,
    ) -> EnvironmentResult {
        let artifact_dir = layout.env_dir(key);
        let ctx = StageContext {
            key,
            env,
            settings,
            toolchain: &self.options.toolchain,
            working_dir: &self.options.working_dir,
            artifact_dir: &artifact_dir,
        };

        log.info(format!(
            "[{}] Planning environment '{}' (template {}, parameters {})",
            key, env.environment, env.template, env.template_parameters
        ));

        let mut result = EnvironmentResult::new(key.clone());
        for stage in self.options.selected() {
            let build_failed = result
                .state_of(StageKind::Build)
                .is_some_and(StageState::is_failure);

            let state = if build_failed {
                StageState::Skipped {
                    reason: "build failed".to_string(),
                }
            } else if stage.needs_subscription() && !env.has_subscription() {
                log.warning(format!(
                    "[{}] Skipping {} stage: no subscription id configured",
                    key, stage
                ));
                StageState::Skipped {
                    reason: "no subscription id".to_string(),
                }
            } else {
                run_stage(stage, &ctx, self.runner.as_ref(), log).await
            };

            result.record(stage, state);
        }
        result
    }
}
