//! `localplan settings`.

use super::{OutputFormat, Workspace, print_json, render_table};
use anyhow::Result;
use localplan_core::{GlobalConfig, RunLog};

fn rows(settings: &GlobalConfig) -> Vec<Vec<String>> {
    vec![
        vec!["providers".to_string(), settings.providers.join(", ")],
        vec!["scope".to_string(), settings.scope.to_string()],
        vec!["baseline".to_string(), settings.baseline.clone()],
        vec!["modules".to_string(), settings.modules.join(", ")],
        vec!["option".to_string(), settings.option.clone()],
        vec!["logSeverity".to_string(), settings.log_severity.to_string()],
    ]
}

pub fn show(workspace: &Workspace, format: OutputFormat) -> Result<()> {
    let log = RunLog::new();
    let settings = workspace.settings(&log);

    match format {
        OutputFormat::Json => print_json(&settings),
        OutputFormat::Table => {
            print!("{}", render_table(&["SETTING", "VALUE"], &rows(&settings)));
            Ok(())
        }
    }
}
