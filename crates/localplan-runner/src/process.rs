//! Tool runners backed by local processes.

use async_trait::async_trait;
use localplan_core::tool::{ToolInvocation, ToolOutput, ToolRunner};
use localplan_core::{Error, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Runs tools as child processes and captures their output.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        debug!(
            command = %invocation.command_line(),
            dir = %invocation.working_dir.display(),
            "Running tool"
        );

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::NotFound(format!("{} (is it installed and on PATH?)", invocation.program))
                } else {
                    Error::Io(e)
                }
            })?;

        let result = ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.is_success() {
            warn!(
                program = %invocation.program,
                exit_code = ?result.exit_code,
                "Tool exited unsuccessfully"
            );
        }

        Ok(result)
    }
}

/// Prints commands instead of running them. Every command succeeds with
/// empty output.
#[derive(Debug, Default, Clone)]
pub struct DryRunRunner;

#[async_trait]
impl ToolRunner for DryRunRunner {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        info!(command = %invocation.command_line(), "Dry run, not executing");
        Ok(ToolOutput::success(""))
    }
}
