//! Artifact directory layout and cleanup.

use crate::{RunnerError, RunnerResult};
use localplan_core::environment::EnvironmentKey;
use localplan_core::{PlanSummary, RunLog};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LOG_FILE: &str = "plan.log";
pub const SUMMARY_FILE: &str = "summary.json";

/// Where a run writes its outputs: one directory per environment plus the
/// run log and summary at the root.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one environment, always a direct child of the root.
    pub fn env_dir(&self, key: &EnvironmentKey) -> PathBuf {
        self.root.join(key.dir_name())
    }

    /// Create the environment directories, first removing whatever a
    /// previous run left behind unless `keep_existing` is set.
    ///
    /// Refuses to clean a root that is, or contains, `working_dir`.
    pub async fn prepare<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a EnvironmentKey>,
        working_dir: &Path,
        keep_existing: bool,
    ) -> RunnerResult<()> {
        if !keep_existing && tokio::fs::try_exists(&self.root).await? {
            let root = tokio::fs::canonicalize(&self.root).await?;
            let working_dir = tokio::fs::canonicalize(working_dir).await?;
            if working_dir.starts_with(&root) {
                return Err(RunnerError::UnsafeArtifactRoot(self.root.clone()));
            }
            debug!(root = %self.root.display(), "Removing previous artifacts");
            tokio::fs::remove_dir_all(&self.root).await?;
        }

        for key in keys {
            tokio::fs::create_dir_all(self.env_dir(key)).await?;
        }
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub async fn write_summary(&self, summary: &PlanSummary) -> RunnerResult<PathBuf> {
        let path = self.root.join(SUMMARY_FILE);
        let json = serde_json::to_string_pretty(summary)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }

    pub async fn write_log(&self, contents: &str) -> RunnerResult<PathBuf> {
        let path = self.root.join(LOG_FILE);
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }
}

/// Remove ARM JSON files that `az bicep build` leaves next to a template
/// when run without `--outdir`. Only files whose stem matches a `.bicep`
/// file in the same directory are removed.
pub async fn remove_bicep_byproducts(dir: &Path, log: &RunLog) -> RunnerResult<Vec<PathBuf>> {
    let mut removed = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "bicep") {
            continue;
        }
        let compiled = path.with_extension("json");
        if tokio::fs::try_exists(&compiled).await? {
            tokio::fs::remove_file(&compiled).await?;
            log.info(format!("Removed build byproduct {}", compiled.display()));
            removed.push(compiled);
        }
    }

    removed.sort();
    Ok(removed)
}
