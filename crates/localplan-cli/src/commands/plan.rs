//! `localplan plan`.

use super::Workspace;
use super::environments::describe_source;
use anyhow::{Context, Result};
use localplan_core::tool::ToolRunner;
use localplan_core::{EnvironmentKey, EnvironmentMap, RunLog, StageKind, StageState};
use localplan_runner::{
    ArtifactLayout, DryRunRunner, PlanOptions, PlanOrchestrator, PlanResult, ProcessRunner,
    Toolchain, remove_bicep_byproducts,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PlanArgs {
    pub envs: Vec<String>,
    pub stages: Vec<StageKind>,
    pub artifacts: PathBuf,
    pub dry_run: bool,
    pub keep_artifacts: bool,
    pub clean_byproducts: bool,
    pub az_bin: String,
    pub pwsh_bin: String,
}

/// Restrict `environments` to the requested keys. An empty request keeps all.
fn select_environments(environments: EnvironmentMap, requested: &[String]) -> Result<EnvironmentMap> {
    if requested.is_empty() {
        return Ok(environments);
    }

    let mut selected = EnvironmentMap::new();
    for name in requested {
        let key = EnvironmentKey::from_branch(name);
        match environments.get(&key) {
            Some(env) => {
                selected.insert(key, env.clone());
            }
            None => {
                let known: Vec<&str> = environments.keys().map(|k| k.as_str()).collect();
                anyhow::bail!(
                    "Unknown environment '{}' (known: {})",
                    name,
                    known.join(", ")
                );
            }
        }
    }
    Ok(selected)
}

fn status(state: &StageState) -> String {
    match state {
        StageState::Pending => "○ pending".to_string(),
        StageState::Succeeded => "✓ succeeded".to_string(),
        StageState::Failed { message } => format!("✗ failed: {}", message),
        StageState::Skipped { reason } => format!("⊘ skipped: {}", reason),
    }
}

fn print_result(result: &PlanResult, log: &RunLog) {
    println!("\n--- Plan Summary ({}) ---", result.run_id);
    for env in &result.environments {
        println!("{}", env.key);
        for outcome in &env.stages {
            println!("  {} - {}", outcome.stage, status(&outcome.state));
        }
    }
    println!(
        "\n{} warning(s), {} error(s)",
        log.warning_count(),
        log.error_count()
    );
}

pub async fn run(workspace: &Workspace, args: PlanArgs) -> Result<()> {
    let root = workspace.root();
    let log = RunLog::new();

    let settings = workspace.settings(&log);
    let resolved = workspace.environments(&log);
    info!(source = %describe_source(resolved.source()), "Resolved environments");
    let environments = select_environments(resolved.snapshot(), &args.envs)?;

    let layout = ArtifactLayout::new(root.join(&args.artifacts));
    layout
        .prepare(environments.keys(), root, args.keep_artifacts)
        .await
        .with_context(|| {
            format!(
                "Failed to prepare artifact directory: {}",
                layout.root().display()
            )
        })?;

    let runner: Arc<dyn ToolRunner> = if args.dry_run {
        Arc::new(DryRunRunner)
    } else {
        Arc::new(ProcessRunner::new())
    };

    let mut options = PlanOptions::new(root);
    options.toolchain = Toolchain {
        az: args.az_bin,
        pwsh: args.pwsh_bin,
    };
    if !args.stages.is_empty() {
        options.stages = args.stages;
    }

    let orchestrator = PlanOrchestrator::new(runner, options);
    let result = orchestrator
        .run(&environments, &settings, &layout, &log)
        .await;

    if args.clean_byproducts {
        let template_dirs: BTreeSet<PathBuf> = environments
            .values()
            .filter_map(|env| root.join(&env.template).parent().map(PathBuf::from))
            .collect();
        for dir in template_dirs {
            if let Err(e) = remove_bicep_byproducts(&dir, &log).await {
                log.warning(format!(
                    "Could not clean build byproducts in {}: {}",
                    dir.display(),
                    e
                ));
            }
        }
    }

    let summary = result.summary(&log);
    layout
        .write_summary(&summary)
        .await
        .context("Failed to write run summary")?;
    layout
        .write_log(&log.render(settings.log_severity))
        .await
        .context("Failed to write run log")?;

    print_result(&result, &log);
    println!("Artifacts: {}", layout.root().display());

    if result.success() {
        println!("\n✓ Plan succeeded!");
        Ok(())
    } else {
        anyhow::bail!("Plan failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localplan_core::EnvironmentConfig;

    fn environments() -> EnvironmentMap {
        ["dev", "prod"]
            .into_iter()
            .map(|k| {
                let key = EnvironmentKey::from(k);
                let env = EnvironmentConfig::defaults_for(&key);
                (key, env)
            })
            .collect()
    }

    #[test]
    fn test_select_all_when_none_requested() {
        let selected = select_environments(environments(), &[]).unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_select_accepts_branch_refs() {
        let selected =
            select_environments(environments(), &["refs/heads/prod".to_string()]).unwrap();
        assert_eq!(
            selected.keys().map(|k| k.as_str()).collect::<Vec<_>>(),
            vec!["prod"]
        );
    }

    #[test]
    fn test_select_unknown_environment_fails() {
        let err = select_environments(environments(), &["uat".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Unknown environment 'uat'"));
        assert!(err.to_string().contains("dev, prod"));
    }
}
