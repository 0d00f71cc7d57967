//! `localplan environments`.

use super::{OutputFormat, Workspace, print_json, render_table};
use anyhow::Result;
use localplan_config::ConfigSource;
use localplan_core::{EnvironmentMap, RunLog};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentsOutput {
    source: String,
    environments: EnvironmentMap,
}

pub fn describe_source(source: &ConfigSource) -> String {
    match source {
        ConfigSource::Pipeline(path) => path.display().to_string(),
        ConfigSource::ParameterFiles => "parameter files".to_string(),
        ConfigSource::Default => "defaults".to_string(),
    }
}

pub fn show(workspace: &Workspace, format: OutputFormat) -> Result<()> {
    let log = RunLog::new();
    let resolved = workspace.environments(&log);
    let environments = resolved.snapshot();

    match format {
        OutputFormat::Json => print_json(&EnvironmentsOutput {
            source: describe_source(resolved.source()),
            environments,
        }),
        OutputFormat::Table => {
            println!("Source: {}\n", describe_source(resolved.source()));
            let rows: Vec<Vec<String>> = environments
                .iter()
                .map(|(key, env)| {
                    vec![
                        key.to_string(),
                        env.environment.clone(),
                        if env.has_subscription() {
                            env.subscription_id.clone()
                        } else {
                            "-".to_string()
                        },
                        env.template.clone(),
                        env.template_parameters.clone(),
                        env.location.clone(),
                    ]
                })
                .collect();
            print!(
                "{}",
                render_table(
                    &[
                        "KEY",
                        "ENVIRONMENT",
                        "SUBSCRIPTION",
                        "TEMPLATE",
                        "PARAMETERS",
                        "LOCATION"
                    ],
                    &rows
                )
            );
            Ok(())
        }
    }
}
