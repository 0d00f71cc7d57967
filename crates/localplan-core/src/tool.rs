//! External tool invocation.
//!
//! Stages never spawn processes directly. They describe a command as a
//! [`ToolInvocation`] and hand it to a [`ToolRunner`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::Result;

/// A command line to run in a working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Program to execute (e.g., `az`).
    pub program: String,
    /// Arguments, unquoted.
    pub args: Vec<String>,
    /// Directory the program runs in.
    pub working_dir: PathBuf,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Whether `flag` is present, optionally followed by `value`.
    pub fn has_arg(&self, flag: &str, value: Option<&str>) -> bool {
        self.args.iter().enumerate().any(|(i, a)| {
            a == flag
                && value.is_none_or(|v| self.args.get(i + 1).is_some_and(|next| next == v))
        })
    }

    /// Printable command line, quoting arguments that contain spaces.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|part| {
                if part.contains(char::is_whitespace) {
                    format!("\"{}\"", part)
                } else {
                    part.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Exit code, absent when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Short description of a failure for logs and summaries.
    pub fn failure_message(&self) -> String {
        let code = self
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let detail = self
            .stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
            .trim();
        if detail.is_empty() {
            format!("exit code {}", code)
        } else {
            format!("exit code {}: {}", code, detail)
        }
    }
}

/// Runs external tools on behalf of plan stages.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Name of this runner.
    fn name(&self) -> &'static str;

    /// Run the tool to completion and capture its output.
    ///
    /// A non-zero exit is reported through [`ToolOutput::exit_code`], not as
    /// an error. Errors mean the tool could not be run at all.
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput>;
}
