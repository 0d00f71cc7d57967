//! Plan stages.
//!
//! Each stage turns an environment's configuration into one or more tool
//! invocations and maps the tool's exit contract onto a [`StageState`].

use localplan_core::environment::{EnvironmentConfig, EnvironmentKey};
use localplan_core::settings::{DeploymentScope, GlobalConfig};
use localplan_core::tool::{ToolInvocation, ToolOutput, ToolRunner};
use localplan_core::{RunLog, StageKind, StageState};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const VALIDATE_OUTPUT: &str = "validate.json";
pub const WHAT_IF_OUTPUT: &str = "whatif.json";
pub const COMPLIANCE_OUTPUT: &str = "compliance.xml";

/// External programs used by the stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Azure CLI binary. Bicep is reached through `az bicep`.
    pub az: String,
    /// PowerShell binary used to run PSRule.
    pub pwsh: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            az: "az".to_string(),
            pwsh: "pwsh".to_string(),
        }
    }
}

/// Everything a stage needs to know about one environment.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub key: &'a EnvironmentKey,
    pub env: &'a EnvironmentConfig,
    pub settings: &'a GlobalConfig,
    pub toolchain: &'a Toolchain,
    pub working_dir: &'a Path,
    pub artifact_dir: &'a Path,
}

impl StageContext<'_> {
    fn az(&self) -> ToolInvocation {
        ToolInvocation::new(&self.toolchain.az, self.working_dir)
    }

    fn parameters_present(&self) -> bool {
        self.working_dir.join(&self.env.template_parameters).is_file()
    }

    fn artifact(&self, name: &str) -> PathBuf {
        self.artifact_dir.join(name)
    }

    fn template_args(&self) -> Vec<String> {
        let mut args = vec!["--template-file".to_string(), self.env.template.clone()];
        if self.parameters_present() {
            args.push("--parameters".to_string());
            args.push(self.env.template_parameters.clone());
        }
        args.push("--subscription".to_string());
        args.push(self.env.subscription_id.clone());
        args
    }
}

fn file_stem(path: &str) -> &str {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
}

/// Scope-specific arguments of `az deployment <group> <verb>`.
pub fn scope_args(scope: &DeploymentScope, location: &str) -> Vec<String> {
    match scope {
        DeploymentScope::Subscription | DeploymentScope::Tenant => {
            vec!["--location".to_string(), location.to_string()]
        }
        DeploymentScope::ResourceGroup(name) => {
            vec!["--resource-group".to_string(), name.clone()]
        }
        DeploymentScope::ManagementGroup(id) => vec![
            "--management-group-id".to_string(),
            id.clone(),
            "--location".to_string(),
            location.to_string(),
        ],
    }
}

fn deployment_command(ctx: &StageContext<'_>, verb: &str) -> ToolInvocation {
    ctx.az()
        .args(["deployment", ctx.settings.scope.az_group(), verb])
        .args(scope_args(&ctx.settings.scope, &ctx.env.location))
        .args(ctx.template_args())
}

pub fn build_template_command(ctx: &StageContext<'_>) -> ToolInvocation {
    ctx.az()
        .args(["bicep", "build", "--file"])
        .arg(ctx.env.template.as_str())
        .arg("--outdir")
        .arg(ctx.artifact_dir.display().to_string())
}

/// Compile the parameters file, when it exists.
pub fn build_params_command(ctx: &StageContext<'_>) -> Option<ToolInvocation> {
    if !ctx.parameters_present() {
        return None;
    }
    let outfile = ctx.artifact(&format!(
        "{}.parameters.json",
        file_stem(&ctx.env.template_parameters)
    ));
    Some(
        ctx.az()
            .args(["bicep", "build-params", "--file"])
            .arg(ctx.env.template_parameters.as_str())
            .arg("--outfile")
            .arg(outfile.display().to_string()),
    )
}

pub fn validate_command(ctx: &StageContext<'_>) -> ToolInvocation {
    deployment_command(ctx, "validate")
}

pub fn provider_command(ctx: &StageContext<'_>, namespace: &str) -> ToolInvocation {
    ctx.az()
        .args(["provider", "show", "--namespace", namespace])
        .args(["--subscription", ctx.env.subscription_id.as_str()])
        .args(["--query", "registrationState", "--output", "tsv"])
}

pub fn what_if_command(ctx: &StageContext<'_>) -> ToolInvocation {
    deployment_command(ctx, "what-if").arg("--no-pretty-print")
}

fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn compliance_command(ctx: &StageContext<'_>) -> ToolInvocation {
    let settings = ctx.settings;
    let modules = settings
        .modules
        .iter()
        .map(|m| ps_quote(m))
        .collect::<Vec<_>>()
        .join(",");

    let mut script = format!(
        "Assert-PSRule -Format File -InputPath {} -Module {} -Baseline {}",
        ps_quote(&ctx.artifact_dir.display().to_string()),
        modules,
        ps_quote(&settings.baseline),
    );
    if ctx.working_dir.join(&settings.option).is_file() {
        script.push_str(&format!(" -Option {}", ps_quote(&settings.option)));
    }
    script.push_str(&format!(
        " -OutputFormat NUnit3 -OutputPath {} -ErrorAction Stop",
        ps_quote(&ctx.artifact(COMPLIANCE_OUTPUT).display().to_string())
    ));

    ToolInvocation::new(&ctx.toolchain.pwsh, ctx.working_dir)
        .args(["-NoProfile", "-NonInteractive", "-Command"])
        .arg(script)
}

/// Count what-if changes by change type.
pub fn summarize_what_if(stdout: &str) -> Option<BTreeMap<String, usize>> {
    let value: serde_json::Value = serde_json::from_str(stdout).ok()?;
    let changes = value.get("changes")?.as_array()?;

    let mut counts = BTreeMap::new();
    for change in changes {
        let kind = change
            .get("changeType")
            .and_then(|c| c.as_str())
            .unwrap_or("Unknown");
        *counts.entry(kind.to_string()).or_insert(0) += 1;
    }
    Some(counts)
}

async fn invoke(
    runner: &dyn ToolRunner,
    invocation: &ToolInvocation,
) -> Result<ToolOutput, String> {
    let output = runner
        .run(invocation)
        .await
        .map_err(|e| format!("{} could not run: {}", invocation.program, e))?;
    if output.is_success() {
        Ok(output)
    } else {
        Err(output.failure_message())
    }
}

async fn save(path: &Path, contents: &str) -> Result<(), String> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| format!("could not write {}: {}", path.display(), e))
}

async fn run_build(ctx: &StageContext<'_>, runner: &dyn ToolRunner) -> Result<(), String> {
    invoke(runner, &build_template_command(ctx)).await?;
    if let Some(params) = build_params_command(ctx) {
        invoke(runner, &params).await?;
    }
    Ok(())
}

async fn run_validate(ctx: &StageContext<'_>, runner: &dyn ToolRunner) -> Result<(), String> {
    let output = invoke(runner, &validate_command(ctx)).await?;
    save(&ctx.artifact(VALIDATE_OUTPUT), &output.stdout).await
}

async fn run_providers(
    ctx: &StageContext<'_>,
    runner: &dyn ToolRunner,
    log: &RunLog,
) -> Result<(), String> {
    for namespace in &ctx.settings.providers {
        let state = match invoke(runner, &provider_command(ctx, namespace)).await {
            Ok(output) => output.stdout.trim().to_string(),
            Err(message) => {
                log.warning(format!(
                    "[{}] Could not query provider {}: {}",
                    ctx.key, namespace, message
                ));
                continue;
            }
        };
        if state.eq_ignore_ascii_case("Registered") {
            tracing::debug!(env = %ctx.key, provider = %namespace, "Provider registered");
        } else {
            log.warning(format!(
                "[{}] Provider {} is not registered (state: {})",
                ctx.key,
                namespace,
                if state.is_empty() { "unknown" } else { state.as_str() }
            ));
        }
    }
    Ok(())
}

async fn run_what_if(
    ctx: &StageContext<'_>,
    runner: &dyn ToolRunner,
    log: &RunLog,
) -> Result<(), String> {
    let output = invoke(runner, &what_if_command(ctx)).await?;
    save(&ctx.artifact(WHAT_IF_OUTPUT), &output.stdout).await?;

    if let Some(counts) = summarize_what_if(&output.stdout) {
        let summary = counts
            .iter()
            .map(|(kind, n)| format!("{} {}", n, kind))
            .collect::<Vec<_>>()
            .join(", ");
        log.info(format!(
            "[{}] What-if changes: {}",
            ctx.key,
            if summary.is_empty() { "none".to_string() } else { summary }
        ));
    }
    Ok(())
}

async fn run_compliance(ctx: &StageContext<'_>, runner: &dyn ToolRunner) -> Result<(), String> {
    invoke(runner, &compliance_command(ctx)).await.map(|_| ())
}

/// Run one stage for one environment.
pub async fn run_stage(
    stage: StageKind,
    ctx: &StageContext<'_>,
    runner: &dyn ToolRunner,
    log: &RunLog,
) -> StageState {
    log.info(format!("[{}] Running {} stage", ctx.key, stage));

    let result = match stage {
        StageKind::Build => run_build(ctx, runner).await,
        StageKind::Validate => run_validate(ctx, runner).await,
        StageKind::Providers => run_providers(ctx, runner, log).await,
        StageKind::WhatIf => run_what_if(ctx, runner, log).await,
        StageKind::Compliance => run_compliance(ctx, runner).await,
    };

    match result {
        Ok(()) => {
            log.success(format!("[{}] {} stage passed", ctx.key, stage));
            StageState::Succeeded
        }
        Err(message) => {
            log.error(format!("[{}] {} stage failed: {}", ctx.key, stage, message));
            StageState::Failed { message }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        working_dir: PathBuf,
        artifact_dir: PathBuf,
        key: EnvironmentKey,
        env: EnvironmentConfig,
        settings: GlobalConfig,
        toolchain: Toolchain,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let working_dir = tmp.path().to_path_buf();
            let artifact_dir = working_dir.join("artifacts").join("dev");
            let key = EnvironmentKey::from("dev");
            let mut env = EnvironmentConfig::defaults_for(&key);
            env.subscription_id = "sub-123".to_string();
            Self {
                _tmp: tmp,
                working_dir,
                artifact_dir,
                key,
                env,
                settings: GlobalConfig::default(),
                toolchain: Toolchain::default(),
            }
        }

        fn ctx(&self) -> StageContext<'_> {
            StageContext {
                key: &self.key,
                env: &self.env,
                settings: &self.settings,
                toolchain: &self.toolchain,
                working_dir: &self.working_dir,
                artifact_dir: &self.artifact_dir,
            }
        }
    }

    #[test]
    fn test_scope_args() {
        assert_eq!(
            scope_args(&DeploymentScope::Subscription, "westeurope"),
            vec!["--location", "westeurope"]
        );
        assert_eq!(
            scope_args(&DeploymentScope::ResourceGroup("rg".to_string()), "westeurope"),
            vec!["--resource-group", "rg"]
        );
        assert_eq!(
            scope_args(&DeploymentScope::ManagementGroup("mg".to_string()), "eastus"),
            vec!["--management-group-id", "mg", "--location", "eastus"]
        );
    }

    #[test]
    fn test_validate_command_without_parameters_file() {
        let fx = Fixture::new();
        let inv = validate_command(&fx.ctx());
        assert_eq!(inv.program, "az");
        assert_eq!(&inv.args[..3], &["deployment", "sub", "validate"]);
        assert!(inv.has_arg("--location", Some("westeurope")));
        assert!(inv.has_arg("--template-file", Some("main.bicep")));
        assert!(inv.has_arg("--subscription", Some("sub-123")));
        assert!(!inv.has_arg("--parameters", None));
    }

    #[test]
    fn test_parameters_used_when_present() {
        let fx = Fixture::new();
        fs::write(fx.working_dir.join("dev.bicepparam"), "using 'main.bicep'\n").unwrap();

        let inv = what_if_command(&fx.ctx());
        assert!(inv.has_arg("--parameters", Some("dev.bicepparam")));
        assert!(inv.has_arg("--no-pretty-print", None));

        let params = build_params_command(&fx.ctx()).unwrap();
        let outfile = fx.artifact_dir.join("dev.parameters.json").display().to_string();
        assert!(params.has_arg("--outfile", Some(outfile.as_str())));
    }

    #[test]
    fn test_resource_group_scope() {
        let mut fx = Fixture::new();
        fx.settings.scope = DeploymentScope::ResourceGroup("rg-app".to_string());
        let inv = validate_command(&fx.ctx());
        assert_eq!(&inv.args[..3], &["deployment", "group", "validate"]);
        assert!(inv.has_arg("--resource-group", Some("rg-app")));
        assert!(!inv.has_arg("--location", None));
    }

    #[test]
    fn test_compliance_command() {
        let mut fx = Fixture::new();
        fx.settings.modules = vec!["PSRule.Rules.Azure".to_string(), "Team's.Rules".to_string()];
        let inv = compliance_command(&fx.ctx());
        assert_eq!(inv.program, "pwsh");
        let script = inv.args.last().unwrap();
        assert!(script.starts_with("Assert-PSRule -Format File"));
        assert!(script.contains("-Module 'PSRule.Rules.Azure','Team''s.Rules'"));
        assert!(script.contains("-Baseline 'Azure.Default'"));
        assert!(!script.contains("-Option"));

        fs::write(fx.working_dir.join("ps-rule.yaml"), "").unwrap();
        let script = compliance_command(&fx.ctx()).args.last().unwrap().clone();
        assert!(script.contains("-Option 'ps-rule.yaml'"));
    }

    #[test]
    fn test_summarize_what_if() {
        let stdout = r#"{"status":"Succeeded","changes":[
            {"changeType":"Create","resourceId":"a"},
            {"changeType":"Modify","resourceId":"b"},
            {"changeType":"Create","resourceId":"c"}
        ]}"#;
        let counts = summarize_what_if(stdout).unwrap();
        assert_eq!(counts.get("Create"), Some(&2));
        assert_eq!(counts.get("Modify"), Some(&1));
        assert!(summarize_what_if("not json").is_none());
    }
}
