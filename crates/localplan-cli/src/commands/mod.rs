//! CLI command implementations.

pub mod environments;
pub mod plan;
pub mod settings;

use anyhow::{Context, Result};
use clap::ValueEnum;
use localplan_config::{ResolvedEnvironments, load_environments, pipeline_roots, settings_roots};
use localplan_core::{GlobalConfig, RunLog};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// The repository a command works on.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    pipeline: Option<PathBuf>,
}

impl Workspace {
    /// Resolve `root`. A relative `pipeline` is taken relative to it.
    pub fn open(root: &Path, pipeline: Option<PathBuf>) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve root directory: {}", root.display()))?;
        let pipeline = pipeline.map(|path| root.join(path));
        Ok(Self { root, pipeline })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self, log: &RunLog) -> GlobalConfig {
        localplan_config::scan_global_settings(&settings_roots(&self.root), log)
    }

    pub fn environments(&self, log: &RunLog) -> ResolvedEnvironments {
        load_environments(
            &self.root,
            &pipeline_roots(&self.root),
            self.pipeline.as_deref(),
            log,
        )
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Render rows as left-aligned columns under a header.
pub fn render_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(header.to_vec());
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}
